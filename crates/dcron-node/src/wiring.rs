//! Assembles the replicated log, scheduler, applier, and runner into one
//! running node. `Executor` and `Storage` are named external collaborators
//! with no concrete implementation anywhere upstream (the Go original ships
//! only their one-method interfaces) — this module supplies the minimal
//! logging defaults a standalone binary needs; embedding a real job runtime
//! means swapping these two out.

use crate::config::NodeConfig;
use crate::metrics;
use async_trait::async_trait;
use dcron_core::{DcronResult, Job, JobId, JobStateRecord};
use dcron_log::{LogApplier, MemoryLog, ReplicatedLog, WaiterRegistry};
use dcron_runner::{Executor, Remover, Runner, Storage};
use dcron_scheduler::Scheduler;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

/// Logs every state transition at `info`; makes no attempt to persist it
/// anywhere durable, since this node's replicated log is itself the
/// authoritative record.
struct TracingStorage;

#[async_trait]
impl Storage for TracingStorage {
    async fn save_job_state(&self, id: &JobId, state: JobStateRecord) -> DcronResult<()> {
        info!(job_id = %id, state = ?state.state, time = state.time, "job state transition");
        Ok(())
    }
}

/// Records that a job fired and reports success. A real deployment replaces
/// this with an executor that dispatches to whatever the job actually runs
/// (a subprocess, an HTTP callback, a queue message); this crate's contract
/// doesn't say which, so the binary can't assume one.
struct LoggingExecutor;

#[async_trait]
impl Executor for LoggingExecutor {
    async fn execute(&self, job: &Job, _remover: &dyn Remover) -> DcronResult<()> {
        info!(job_id = %job.id, "executing job");
        metrics::record_job_execution("default", "success");
        Ok(())
    }
}

/// Every long-lived component a running node needs, handed back to `main`
/// so it can build the HTTP state and hold the scheduler/runner alive for
/// the process lifetime.
pub struct Node {
    pub log: Arc<dyn ReplicatedLog>,
    pub applier: Arc<LogApplier>,
    pub waiters: Arc<WaiterRegistry<dcron_log::ApplyOutcome>>,
    pub scheduler: Arc<Scheduler>,
    pub runner: Arc<Runner>,
    pub prometheus: PrometheusHandle,
}

/// Builds and starts every in-process component: the log, its applier, the
/// scheduler, and the leader-gated runner sitting on top of them. Does not
/// bind any network listener — that's `main`'s job once this returns.
pub fn build(config: &NodeConfig, prometheus: PrometheusHandle) -> Node {
    let log: Arc<dyn ReplicatedLog> = Arc::new(MemoryLog::new(config.name.clone()));
    let scheduler = Arc::new(Scheduler::new());
    let waiters = Arc::new(WaiterRegistry::new());
    let cluster_id: u64 = seed_from_name(&config.name);

    let (runner, applier) = Runner::build(
        log.clone(),
        scheduler.clone(),
        waiters.clone(),
        cluster_id,
        Arc::new(TracingStorage),
        Arc::new(LoggingExecutor),
        config.election_ms,
    );

    let applier_run = applier.clone();
    tokio::spawn(async move { applier_run.run().await });
    scheduler.start();

    Node {
        log,
        applier,
        waiters,
        scheduler,
        runner,
        prometheus,
    }
}

/// Deterministic, non-cryptographic seed for the correlation generator's
/// cluster-id bits, derived from the node name so two nodes in the same
/// process (as in tests) don't collide.
fn seed_from_name(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
