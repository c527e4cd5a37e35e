//! The runner proper: gated on leadership, bounded to one in-flight
//! execution per job, orchestrating the log writes that bracket a job's
//! actual execution.

use crate::traits::{Executor, Remover, Storage};
use chrono::{DateTime, Utc};
use dcron_core::{
    CorrelationGenerator, DcronError, DcronResult, Job, JobId, JobState, JobStateRecord, Schedule,
};
use dcron_log::{encode_put, ApplyOutcome, LogApplier, ReplicatedLog, WaiterRegistry};
use dcron_scheduler::Scheduler;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Orchestrates fire → `starting` → execute → `started`, re-entering the
/// replicated log at each transition so survivors can pick up a job after a
/// leadership change. Gated: only the current leader acts on a fire.
pub struct Runner {
    log: Arc<dyn ReplicatedLog>,
    applier: Arc<LogApplier>,
    waiters: Arc<WaiterRegistry<ApplyOutcome>>,
    correlation_gen: CorrelationGenerator,
    storage: Arc<dyn Storage>,
    executor: Arc<dyn Executor>,
    in_progress: Mutex<HashSet<JobId>>,
    election_ms: u64,
}

impl Runner {
    pub fn new(
        log: Arc<dyn ReplicatedLog>,
        applier: Arc<LogApplier>,
        waiters: Arc<WaiterRegistry<ApplyOutcome>>,
        cluster_id: u64,
        storage: Arc<dyn Storage>,
        executor: Arc<dyn Executor>,
        election_ms: u64,
    ) -> Self {
        Self {
            log,
            applier,
            waiters,
            correlation_gen: CorrelationGenerator::new(cluster_id),
            storage,
            executor,
            in_progress: Mutex::new(HashSet::new()),
            election_ms,
        }
    }

    /// Builds the scheduler's `on_fire` callback. Each fire is dispatched to
    /// a fresh task — the scheduler's loop must never block on execution.
    pub fn on_fire_callback(self: &Arc<Self>) -> Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync> {
        let runner = Arc::clone(self);
        Arc::new(move |job_id, fire_time| {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move {
                runner.handle_fire(job_id, fire_time).await;
            });
        })
    }

    /// Builds a `Runner` together with the `LogApplier` it reads from. The
    /// two are mutually referential — the applier's `on_fire` callback must
    /// call back into the runner, and the runner reads the applier's job
    /// map on every fire — so they're constructed together via a weak
    /// self-reference rather than handed to each other after the fact.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        log: Arc<dyn ReplicatedLog>,
        scheduler: Arc<Scheduler>,
        waiters: Arc<WaiterRegistry<ApplyOutcome>>,
        cluster_id: u64,
        storage: Arc<dyn Storage>,
        executor: Arc<dyn Executor>,
        election_ms: u64,
    ) -> (Arc<Self>, Arc<LogApplier>) {
        let applier_slot: Arc<std::sync::OnceLock<Arc<LogApplier>>> =
            Arc::new(std::sync::OnceLock::new());

        let runner = Arc::new_cyclic(|weak: &Weak<Runner>| {
            let weak_for_fire = weak.clone();
            let on_fire: Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync> =
                Arc::new(move |job_id, fire_time| {
                    let Some(runner) = weak_for_fire.upgrade() else {
                        return;
                    };
                    tokio::spawn(async move {
                        runner.handle_fire(job_id, fire_time).await;
                    });
                });

            let applier = Arc::new(LogApplier::new(
                log.clone(),
                scheduler,
                on_fire,
                waiters.clone(),
            ));
            applier_slot
                .set(applier.clone())
                .unwrap_or_else(|_| unreachable!("applier_slot set exactly once"));

            Runner {
                log,
                applier,
                waiters,
                correlation_gen: CorrelationGenerator::new(cluster_id),
                storage,
                executor,
                in_progress: Mutex::new(HashSet::new()),
                election_ms,
            }
        });

        let applier = applier_slot.get().expect("set during construction").clone();
        (runner, applier)
    }

    async fn handle_fire(self: Arc<Self>, job_id: JobId, fire_time: DateTime<Utc>) {
        match self.log.leader_id().await {
            Ok(leader) if leader == self.log.self_id() => {}
            Ok(_) => return,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "could not determine leader, skipping fire");
                return;
            }
        }

        {
            let mut in_progress = self.in_progress.lock();
            if in_progress.contains(&job_id) {
                debug!(job_id = %job_id, "skipped: execution already in progress");
                return;
            }
            in_progress.insert(job_id.clone());
        }
        let _guard = InProgressGuard {
            set: &self.in_progress,
            id: job_id.clone(),
        };

        let Some(mut job) = self.applier.get(&job_id) else {
            debug!(job_id = %job_id, "job no longer present, skipping fire");
            return;
        };

        // The same schedule instance the scheduler just popped and called
        // `before_job` on — not a fresh clone of `job.schedule` — so that
        // `next()` here reflects the in-flight/ran state the scheduler and
        // this runner share.
        let schedule = self.applier.schedule_for(&job_id);

        if matches!(job.state.state, JobState::Initial | JobState::Started) {
            let starting = JobStateRecord::new(JobState::Starting, fire_time);
            job.next = schedule
                .as_ref()
                .map(|s| s.next(fire_time))
                .unwrap_or(job.next);
            if let Err(err) = self.submit_put(&job, starting, 3).await {
                error!(job_id = %job_id, error = %err, "starting transition failed, recording error state");
                self.record(&job_id, JobStateRecord::new(JobState::Error, fire_time))
                    .await;
                return;
            }
            self.record(&job_id, starting).await;
        }

        let remover = RunnerRemover {
            runner: Arc::clone(&self),
        };

        let outcome = self.executor.execute(&job, &remover).await;

        // Released regardless of outcome: `before_job` marked the schedule
        // in-flight when the scheduler popped this entry, and nothing else
        // clears that flag.
        if let Some(schedule) = &schedule {
            schedule.after_job();
        }

        match outcome {
            Ok(()) => {
                let now = Utc::now();
                let started = JobStateRecord::new(JobState::Started, now);
                job.next = schedule.as_ref().map(|s| s.next(now)).unwrap_or(job.next);
                if let Err(err) = self.submit_put(&job, started, 3).await {
                    error!(job_id = %job_id, error = %err, "started transition failed");
                    self.record(&job_id, JobStateRecord::new(JobState::Error, now))
                        .await;
                    return;
                }
                self.record(&job_id, started).await;

                if job.next.is_none() {
                    if let Err(err) = self.submit_delete(&job_id).await {
                        error!(job_id = %job_id, error = %err, "delete-after-exhaustion failed");
                    }
                }
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "execution failed");
                let now = Utc::now();
                self.record(&job_id, JobStateRecord::new(JobState::Error, now))
                    .await;
            }
        }
    }

    async fn record(&self, id: &JobId, state: JobStateRecord) {
        if let Err(err) = self.storage.save_job_state(id, state).await {
            warn!(job_id = %id, error = %err, "storage write failed (best-effort)");
        }
    }

    async fn submit_put(
        &self,
        current: &Job,
        state: JobStateRecord,
        election_multiplier: u64,
    ) -> DcronResult<Job> {
        let mut job = current.clone();
        job.state = state;
        job.prev = Some(Utc::now());

        let correlation = self.correlation_gen.next();
        let rx = self.waiters.register(correlation);
        let payload = encode_put(correlation, &job);

        self.log
            .put(job.id.as_str(), payload)
            .await
            .map_err(|e| DcronError::TransientWrite(e.to_string()))?;

        let deadline = Duration::from_millis(election_multiplier * self.election_ms);
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(ApplyOutcome::Applied(job))) => Ok(job),
            Ok(Ok(ApplyOutcome::Deleted(_))) => Err(DcronError::TransientWrite(
                "job deleted before put applied".into(),
            )),
            Ok(Err(_)) | Err(_) => {
                self.waiters.cancel(&correlation);
                Err(DcronError::TransientWrite("put timed out waiting for apply".into()))
            }
        }
    }

    async fn submit_delete(&self, id: &JobId) -> DcronResult<()> {
        let correlation = dcron_core::CorrelationId::for_delete(id.as_str());
        let rx = self.waiters.register(correlation);

        self.log
            .delete(id.as_str())
            .await
            .map_err(|e| DcronError::TransientWrite(e.to_string()))?;

        let deadline = Duration::from_millis(10 * self.election_ms);
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) | Err(_) => {
                self.waiters.cancel(&correlation);
                Err(DcronError::TransientWrite(
                    "delete timed out waiting for apply".into(),
                ))
            }
        }
    }
}

struct InProgressGuard<'a> {
    set: &'a Mutex<HashSet<JobId>>,
    id: JobId,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// [`Remover`] implementation handed to the executor, submitting a Delete
/// through the same runner that invoked it.
struct RunnerRemover {
    runner: Arc<Runner>,
}

#[async_trait::async_trait]
impl Remover for RunnerRemover {
    async fn remove(&self, id: &JobId) -> DcronResult<()> {
        self.runner.submit_delete(id).await
    }
}
