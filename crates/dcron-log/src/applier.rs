//! Transforms the replicated log's change stream into local job-map and
//! scheduler mutations. Single-threaded by construction (one `run` loop
//! consuming one event stream), so events are applied strictly in log
//! order under one exclusive lock covering both the job map and scheduler
//! membership — the same lock the runner's outer steps share, never held
//! across blocking I/O.

use crate::log::{LogEvent, LogEventKind, ReplicatedLog};
use crate::waiter::WaiterRegistry;
use chrono::{DateTime, Utc};
use dcron_core::{CorrelationId, Job, JobId};
use dcron_scheduler::Scheduler;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The value delivered to a waiter once its Put/Delete has applied.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(Job),
    Deleted(JobId),
}

/// Wire shape of a Put payload: the correlation token plus the job fields.
/// Keyed `correlation` rather than `id` at the top level so it doesn't
/// collide with the job's own `id` field once flattened.
#[derive(Debug, Serialize, Deserialize)]
struct PutPayload {
    correlation: u64,
    #[serde(flatten)]
    job: Job,
}

/// Encodes a Put payload for submission to a [`ReplicatedLog`]. Shared by
/// every writer (HTTP handlers, the runner) so the wire shape lives in one
/// place.
pub fn encode_put(correlation: CorrelationId, job: &Job) -> Vec<u8> {
    let payload = PutPayload {
        correlation: correlation.0,
        job: job.clone(),
    };
    serde_json::to_vec(&payload).expect("Job always serializes")
}

/// Single-threaded consumer of a [`ReplicatedLog`]'s change stream.
pub struct LogApplier {
    log: Arc<dyn ReplicatedLog>,
    scheduler: Arc<Scheduler>,
    on_fire: Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync>,
    waiters: Arc<WaiterRegistry<ApplyOutcome>>,
    jobs: Mutex<HashMap<JobId, Job>>,
    /// The exact [`dcron_core::Schedule`] instance each job's scheduler entry
    /// was armed with. Kept alongside `jobs` (rather than letting callers
    /// re-clone `Job::schedule`) so `before_job`/`after_job` calls made by
    /// the scheduler and the runner land on the same `OnceSchedule` state
    /// instead of two independent copies.
    schedules: Mutex<HashMap<JobId, Arc<dyn dcron_core::Schedule>>>,
}

impl LogApplier {
    pub fn new(
        log: Arc<dyn ReplicatedLog>,
        scheduler: Arc<Scheduler>,
        on_fire: Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync>,
        waiters: Arc<WaiterRegistry<ApplyOutcome>>,
    ) -> Self {
        Self {
            log,
            scheduler,
            on_fire,
            waiters,
            jobs: Mutex::new(HashMap::new()),
            schedules: Mutex::new(HashMap::new()),
        }
    }

    /// Current in-memory job map snapshot (for HTTP status/diagnostics).
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().values().cloned().collect()
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.lock().get(id).cloned()
    }

    /// The live schedule instance backing `id`'s scheduler entry, if the job
    /// is currently installed. The runner calls `before_job`/`after_job` on
    /// this handle rather than on a fresh clone of `Job::schedule`.
    pub fn schedule_for(&self, id: &JobId) -> Option<Arc<dyn dcron_core::Schedule>> {
        self.schedules.lock().get(id).cloned()
    }

    /// Consumes the log's change stream until it closes. Never returns an
    /// error: a malformed payload is logged and skipped, the node keeps
    /// running.
    pub async fn run(&self) {
        let mut rx = self.log.watch();
        while let Some(event) = rx.recv().await {
            self.apply(event);
        }
    }

    fn apply(&self, event: LogEvent) {
        match event.kind {
            LogEventKind::Put { key, value } => self.apply_put(&key, &value),
            LogEventKind::Delete { key } => self.apply_delete(&key),
        }
    }

    fn apply_put(&self, key: &str, value: &[u8]) {
        let payload: PutPayload = match serde_json::from_slice(value) {
            Ok(p) => p,
            Err(err) => {
                warn!(job_id = %key, error = %err, "decode-drop: malformed put payload, skipping");
                return;
            }
        };

        let job = payload.job;
        let schedule: Arc<dyn dcron_core::Schedule> = Arc::new(clone_schedule(&job));

        {
            let mut jobs = self.jobs.lock();
            let mut schedules = self.schedules.lock();
            match job.next {
                Some(next) => {
                    self.scheduler.add_entry(
                        job.id.clone(),
                        next,
                        schedule.clone(),
                        self.on_fire.clone(),
                    );
                    schedules.insert(job.id.clone(), schedule);
                }
                None => {
                    self.scheduler.remove_entry(&job.id);
                    schedules.remove(&job.id);
                }
            }
            jobs.insert(job.id.clone(), job.clone());
        }

        debug!(job_id = %job.id, "applied put");
        self.waiters
            .trigger(CorrelationId(payload.correlation), ApplyOutcome::Applied(job));
    }

    fn apply_delete(&self, key: &str) {
        let id = JobId::new(key);
        {
            let mut jobs = self.jobs.lock();
            if jobs.remove(&id).is_some() {
                self.scheduler.remove_entry(&id);
                self.schedules.lock().remove(&id);
            }
        }
        debug!(job_id = %id, "applied delete");
        self.waiters.trigger(
            CorrelationId::for_delete(id.as_str()),
            ApplyOutcome::Deleted(id),
        );
    }
}

/// Rematerializes a schedule object from a job's persisted descriptor.
/// Deliberately rebuilt on every apply rather than cached: breaks the
/// Job/Handler reference cycle instead of serializing a back-pointer.
fn clone_schedule(job: &Job) -> dcron_core::ScheduleDescriptor {
    job.schedule.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcron_core::{CronSchedule, JobState, JobStateRecord, ScheduleDescriptor};

    fn encode_put(correlation: u64, job: &Job) -> Vec<u8> {
        let payload = super::PutPayload {
            correlation,
            job: job.clone(),
        };
        serde_json::to_vec(&payload).unwrap()
    }

    fn test_job(id: &str, next_in_secs: i64) -> Job {
        let now = chrono::Utc::now();
        Job {
            id: JobId::new(id),
            schedule: ScheduleDescriptor::Cron(CronSchedule::new("* * * * * *").unwrap()),
            state: JobStateRecord::new(JobState::Initial, now),
            next: Some(now + chrono::Duration::seconds(next_in_secs)),
            prev: None,
        }
    }

    #[tokio::test]
    async fn put_installs_job_in_map_and_triggers_waiter() {
        let log = Arc::new(crate::log::MemoryLog::new("node-a"));
        let scheduler = Arc::new(Scheduler::new());
        let waiters = Arc::new(WaiterRegistry::new());
        let applier = Arc::new(LogApplier::new(
            log.clone(),
            scheduler.clone(),
            Arc::new(|_id, _prev| {}),
            waiters.clone(),
        ));

        let applier_run = applier.clone();
        tokio::spawn(async move { applier_run.run().await });

        let job = test_job("j1", 30);
        let payload = encode_put(1, &job);

        let rx = waiters.register(CorrelationId(1));
        log.put("j1", payload).await.unwrap();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied(ref j) if j.id == JobId::new("j1")));
        assert!(applier.get(&JobId::new("j1")).is_some());
    }

    #[tokio::test]
    async fn delete_removes_job_and_triggers_deterministic_waiter() {
        let log = Arc::new(crate::log::MemoryLog::new("node-a"));
        let scheduler = Arc::new(Scheduler::new());
        let waiters = Arc::new(WaiterRegistry::new());
        let applier = Arc::new(LogApplier::new(
            log.clone(),
            scheduler.clone(),
            Arc::new(|_id, _prev| {}),
            waiters.clone(),
        ));

        let applier_run = applier.clone();
        tokio::spawn(async move { applier_run.run().await });

        let job = test_job("j2", 30);
        log.put("j2", encode_put(2, &job)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(applier.get(&JobId::new("j2")).is_some());

        let token = CorrelationId::for_delete("j2");
        let rx = waiters.register(token);
        log.delete("j2").await.unwrap();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Deleted(id) if id == JobId::new("j2")));
        assert!(applier.get(&JobId::new("j2")).is_none());
    }

    #[tokio::test]
    async fn malformed_payload_is_skipped_without_crashing() {
        let log = Arc::new(crate::log::MemoryLog::new("node-a"));
        let scheduler = Arc::new(Scheduler::new());
        let waiters = Arc::new(WaiterRegistry::new());
        let applier = Arc::new(LogApplier::new(
            log.clone(),
            scheduler,
            Arc::new(|_id, _prev| {}),
            waiters,
        ));

        let applier_run = applier.clone();
        tokio::spawn(async move { applier_run.run().await });

        log.put("broken", b"not json".to_vec()).await.unwrap();
        // A subsequent, well-formed put must still apply normally.
        let job = test_job("j3", 30);
        log.put("j3", encode_put(3, &job)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(applier.get(&JobId::new("j3")).is_some());
    }
}
