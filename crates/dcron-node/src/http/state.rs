//! Shared state handed to every HTTP handler.

use dcron_core::CorrelationGenerator;
use dcron_log::{ApplyOutcome, LogApplier, ReplicatedLog, WaiterRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState(Arc<Inner>);

struct Inner {
    pub name: String,
    pub server_url: String,
    pub client_port: u16,
    pub log: Arc<dyn ReplicatedLog>,
    pub applier: Arc<LogApplier>,
    pub waiters: Arc<WaiterRegistry<ApplyOutcome>>,
    pub correlation_gen: CorrelationGenerator,
    pub election_ms: u64,
    pub running: AtomicBool,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        server_url: String,
        client_port: u16,
        log: Arc<dyn ReplicatedLog>,
        applier: Arc<LogApplier>,
        waiters: Arc<WaiterRegistry<ApplyOutcome>>,
        cluster_id: u64,
        election_ms: u64,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self(Arc::new(Inner {
            name,
            server_url,
            client_port,
            log,
            applier,
            waiters,
            correlation_gen: CorrelationGenerator::new(cluster_id),
            election_ms,
            running: AtomicBool::new(true),
            prometheus,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
    pub fn server_url(&self) -> &str {
        &self.0.server_url
    }
    pub fn client_port(&self) -> u16 {
        self.0.client_port
    }
    pub fn log(&self) -> &Arc<dyn ReplicatedLog> {
        &self.0.log
    }
    pub fn applier(&self) -> &Arc<LogApplier> {
        &self.0.applier
    }
    pub fn waiters(&self) -> &Arc<WaiterRegistry<ApplyOutcome>> {
        &self.0.waiters
    }
    pub fn next_correlation(&self) -> dcron_core::CorrelationId {
        self.0.correlation_gen.next()
    }
    pub fn election_ms(&self) -> u64 {
        self.0.election_ms
    }
    pub fn is_running(&self) -> bool {
        self.0.running.load(std::sync::atomic::Ordering::SeqCst)
    }
    pub fn mark_stopped(&self) {
        self.0.running.store(false, std::sync::atomic::Ordering::SeqCst);
    }
    pub fn prometheus(&self) -> &PrometheusHandle {
        &self.0.prometheus
    }
}
