//! The three named measures, exposed as `metrics` crate primitives with
//! `metrics-exporter-prometheus` wired as the process-wide recorder. Actually
//! exporting these to an OpenCensus/Prometheus scrape pipeline is the
//! operator's concern; this node only emits them and serves the recorder's
//! own text rendering at `/metrics`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub mod names {
    pub const HTTP_REQUESTS: &str = "dcron_http_requests";
    pub const HTTP_REQUEST_LATENCY: &str = "dcron_http_request_latency";
    pub const JOB_EXECUTIONS: &str = "dcron_job_executions";
}

/// Installs the process-wide Prometheus recorder and returns its handle,
/// used by the `/metrics` route to render the current snapshot.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(names::HTTP_REQUESTS, "Count of HTTP requests handled");
    describe_histogram!(
        names::HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_counter!(names::JOB_EXECUTIONS, "Count of job executions dispatched");

    handle
}

/// Records one completed HTTP request.
pub fn record_http_request(method: &str, status: u16, latency: Duration) {
    counter!(
        names::HTTP_REQUESTS,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_LATENCY,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(latency.as_secs_f64() * 1000.0);
}

/// Records one job execution outcome.
pub fn record_job_execution(job_type: &str, status: &str) {
    counter!(
        names::JOB_EXECUTIONS,
        "type" => job_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
