//! End-to-end coverage of the scenarios driven straight against
//! `dcron-runner`/`dcron-log` rather than through the HTTP surface: cross-node
//! replication off a shared log, a once-job's full starting/started audit
//! trail, a cron job's drift-bounded fire cadence, and deletion through the
//! `Remover` capability. The consensus engine a real multi-node deployment
//! would run is a named external collaborator with no upstream
//! implementation (same gap `dcron_log::MemoryLog`'s doc comment notes), so
//! "two nodes" here means two independent appliers watching one shared
//! `MemoryLog` — the part of replication this crate actually owns.

use chrono::Utc;
use dcron_core::{CronSchedule, Job, JobId, JobState, JobStateRecord, OnceSchedule, ScheduleDescriptor};
use dcron_log::{encode_put, ApplyOutcome, LogApplier, MemoryLog, ReplicatedLog, WaiterRegistry};
use dcron_runner::{Remover, Runner, Storage};
use dcron_scheduler::Scheduler;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct RecordingStorage {
    records: Mutex<Vec<JobStateRecord>>,
}

impl RecordingStorage {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
        })
    }

    fn snapshot(&self) -> Vec<JobStateRecord> {
        self.records.lock().clone()
    }
}

#[async_trait::async_trait]
impl Storage for RecordingStorage {
    async fn save_job_state(&self, _id: &JobId, state: JobStateRecord) -> dcron_core::DcronResult<()> {
        self.records.lock().push(state);
        Ok(())
    }
}

struct NoopExecutor;

#[async_trait::async_trait]
impl dcron_runner::Executor for NoopExecutor {
    async fn execute(&self, _job: &Job, _remover: &dyn Remover) -> dcron_core::DcronResult<()> {
        Ok(())
    }
}

/// Deletes its own job through the `Remover` capability handed to it,
/// exercising the exact self-terminating path `Executor::execute`'s second
/// argument exists for.
struct SelfDeletingExecutor;

#[async_trait::async_trait]
impl dcron_runner::Executor for SelfDeletingExecutor {
    async fn execute(&self, job: &Job, remover: &dyn Remover) -> dcron_core::DcronResult<()> {
        remover.remove(&job.id).await
    }
}

async fn put_and_wait(
    log: &Arc<MemoryLog>,
    waiters: &WaiterRegistry<ApplyOutcome>,
    job: &Job,
    correlation: u64,
) {
    let token = dcron_core::CorrelationId(correlation);
    let rx = waiters.register(token);
    log.put(job.id.as_str(), encode_put(token, job)).await.unwrap();
    rx.await.unwrap();
}

// E2 — replication: two appliers watching one shared log converge on the
// same job within 100 ms of a single put.
#[tokio::test]
async fn e2_cross_applier_replication_converges_within_100ms() {
    let log = Arc::new(MemoryLog::new("node-a"));
    let waiters = Arc::new(WaiterRegistry::new());

    let scheduler_a = Arc::new(Scheduler::new());
    let applier_a = Arc::new(LogApplier::new(
        log.clone(),
        scheduler_a,
        Arc::new(|_id, _t| {}),
        waiters.clone(),
    ));
    let scheduler_b = Arc::new(Scheduler::new());
    let applier_b = Arc::new(LogApplier::new(
        log.clone(),
        scheduler_b,
        Arc::new(|_id, _t| {}),
        waiters.clone(),
    ));

    let run_a = applier_a.clone();
    tokio::spawn(async move { run_a.run().await });
    let run_b = applier_b.clone();
    tokio::spawn(async move { run_b.run().await });

    let now = Utc::now();
    let job = Job::new(
        JobId::new("j1"),
        ScheduleDescriptor::Cron(CronSchedule::new("* * * * * *").unwrap()),
        now,
    );
    put_and_wait(&log, &waiters, &job, 1).await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(applier_a.get(&JobId::new("j1")).is_some());
    assert!(applier_b.get(&JobId::new("j1")).is_some());
}

// E3 — once execution: the Storage audit trail for a once-job is exactly
// [{starting, t}, {started, t}], and the job is gone afterward since its
// schedule is now exhausted.
#[tokio::test]
async fn e3_once_job_runs_to_completion_and_is_removed() {
    let log = Arc::new(MemoryLog::new("node-a"));
    let waiters = Arc::new(WaiterRegistry::new());
    let storage = RecordingStorage::new();

    let (runner, applier) = Runner::build(
        log.clone() as Arc<dyn ReplicatedLog>,
        Arc::new(Scheduler::new()),
        waiters.clone(),
        1,
        storage.clone(),
        Arc::new(NoopExecutor),
        50,
    );
    let applier_run = applier.clone();
    tokio::spawn(async move { applier_run.run().await });

    let now = Utc::now();
    let job = Job::new(
        JobId::new("j2"),
        ScheduleDescriptor::Once(OnceSchedule::new(now)),
        now,
    );
    put_and_wait(&log, &waiters, &job, 2).await;

    runner.clone().handle_fire(JobId::new("j2"), now).await;

    let records = storage.snapshot();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].state, JobState::Starting);
    assert_eq!(records[1].state, JobState::Started);

    // Schedule exhausted after its one run: the runner must have submitted
    // the post-execute Delete, so the job no longer lives in the map.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(applier.get(&JobId::new("j2")).is_none());
}

// E4 — cron drift bound: over ~2.2s of a 1-second cron schedule, storage
// accumulates an alternating starting/started trail within the bound a
// 1-second cadence implies.
#[tokio::test]
async fn e4_cron_job_fires_within_drift_bound_over_multiple_cycles() {
    let log = Arc::new(MemoryLog::new("node-a"));
    let waiters = Arc::new(WaiterRegistry::new());
    let storage = RecordingStorage::new();

    let scheduler = Arc::new(Scheduler::new());
    let (_runner, applier) = Runner::build(
        log.clone() as Arc<dyn ReplicatedLog>,
        scheduler.clone(),
        waiters.clone(),
        1,
        storage.clone(),
        Arc::new(NoopExecutor),
        50,
    );
    let applier_run = applier.clone();
    tokio::spawn(async move { applier_run.run().await });
    scheduler.start();

    let now = Utc::now();
    let job = Job::new(
        JobId::new("j3"),
        ScheduleDescriptor::Cron(CronSchedule::new("* * * * * *").unwrap()),
        now,
    );
    put_and_wait(&log, &waiters, &job, 3).await;

    tokio::time::sleep(Duration::from_millis(2200)).await;
    scheduler.stop().await;

    let records = storage.snapshot();
    assert!(records.len() >= 2, "expected at least 2 entries, got {}", records.len());
    assert!(records.len() <= 6, "expected at most 6 entries, got {}", records.len());
    for pair in records.chunks(2) {
        if let [starting, started] = pair {
            assert_eq!(starting.state, JobState::Starting);
            assert_eq!(started.state, JobState::Started);
        }
    }
}

// E5 — delete via the Remover capability: a self-deleting executor removes
// its own job, leaving it out of both the applier's map and the scheduler.
#[tokio::test]
async fn e5_remover_capability_deletes_the_job() {
    let log = Arc::new(MemoryLog::new("node-a"));
    let waiters = Arc::new(WaiterRegistry::new());
    let storage = RecordingStorage::new();

    let scheduler = Arc::new(Scheduler::new());
    let (runner, applier) = Runner::build(
        log.clone() as Arc<dyn ReplicatedLog>,
        scheduler.clone(),
        waiters.clone(),
        1,
        storage.clone(),
        Arc::new(SelfDeletingExecutor),
        50,
    );
    let applier_run = applier.clone();
    tokio::spawn(async move { applier_run.run().await });

    let now = Utc::now();
    let job = Job::new(
        JobId::new("j4"),
        ScheduleDescriptor::Cron(CronSchedule::new("* * * * * *").unwrap()),
        now,
    );
    put_and_wait(&log, &waiters, &job, 4).await;

    runner.handle_fire(JobId::new("j4"), now).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(applier.get(&JobId::new("j4")).is_none());
    assert!(applier.schedule_for(&JobId::new("j4")).is_none());
    assert!(scheduler.is_empty(), "scheduler must hold no entry for a deleted job");
}
