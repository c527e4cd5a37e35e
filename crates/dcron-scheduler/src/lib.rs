//! Single cooperative loop owning one reusable timer, armed for whichever
//! entry in the [`PriorityQueue`] has the smallest `next`. Bounded to O(1)
//! resource use regardless of entry count, because only the minimum is ever
//! armed — the opposite of a timer-per-entry design.

use chrono::{DateTime, Utc};
use dcron_core::{JobId, Schedule};
use dcron_queue::{Entry, PriorityQueue};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// What the scheduler needs to fire an entry: the schedule to recompute
/// `next` from, and the callback to invoke. Kept generic over neither —
/// `dcron-runner` supplies both when it registers a job.
#[derive(Clone)]
pub struct JobHandle {
    schedule: Arc<dyn Schedule>,
    on_fire: Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync>,
}

impl JobHandle {
    pub fn new(
        schedule: Arc<dyn Schedule>,
        on_fire: Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync>,
    ) -> Self {
        Self { schedule, on_fire }
    }
}

/// Single-timer scheduler loop. States: idle (queue empty, blocked on
/// `added`/`stop`) and waiting (armed for the earliest entry).
pub struct Scheduler {
    queue: Arc<PriorityQueue<JobHandle>>,
    added: Arc<Notify>,
    removed: Arc<Notify>,
    stop_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            queue: Arc::new(PriorityQueue::new()),
            added: Arc::new(Notify::new()),
            removed: Arc::new(Notify::new()),
            stop_tx,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Adds (or updates) an entry. Delivers on `added` only if the loop is
    /// currently running; otherwise the entry is simply pre-seeded for when
    /// `start` is called.
    pub fn add_entry(
        &self,
        job_id: JobId,
        next: DateTime<Utc>,
        schedule: Arc<dyn Schedule>,
        on_fire: Arc<dyn Fn(JobId, DateTime<Utc>) + Send + Sync>,
    ) {
        let handle = JobHandle::new(schedule, on_fire);
        self.queue.add(Entry::new(job_id, next, handle));
        if self.running.load(Ordering::SeqCst) {
            self.added.notify_one();
        }
    }

    /// Removes the entry for `job_id`, if present. Returns whether it
    /// existed. After removing the current minimum, the next fire occurs at
    /// the new minimum's `next`, not the old one.
    pub fn remove_entry(&self, job_id: &JobId) -> bool {
        let existed = self.queue.remove(job_id);
        if existed && self.running.load(Ordering::SeqCst) {
            self.removed.notify_one();
        }
        existed
    }

    /// True if the loop is currently spawned and running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the loop exactly once. Idempotent: a second call while already
    /// running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let queue = self.queue.clone();
        let added = self.added.clone();
        let removed = self.removed.clone();
        let mut stop_rx = self.stop_tx.subscribe();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            run_loop(&queue, &added, &removed, &mut stop_rx).await;
            running.store(false, Ordering::SeqCst);
        });
        *self.task.lock() = Some(handle);
    }

    /// Sends `stop` and waits for the loop to exit. A no-op if not running.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.send(());
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Number of entries currently queued (for diagnostics/tests).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(
    queue: &PriorityQueue<JobHandle>,
    added: &Notify,
    removed: &Notify,
    stop_rx: &mut broadcast::Receiver<()>,
) {
    loop {
        match queue.peek() {
            None => {
                trace!("scheduler idle, queue empty");
                tokio::select! {
                    _ = stop_rx.recv() => return,
                    _ = added.notified() => continue,
                    _ = removed.notified() => continue,
                }
            }
            Some(top) => {
                let now = Utc::now();
                let delay = (top.next - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(0));
                tokio::select! {
                    _ = stop_rx.recv() => return,
                    _ = added.notified() => continue,
                    _ = removed.notified() => continue,
                    _ = tokio::time::sleep(delay) => {
                        fire(queue);
                    }
                }
            }
        }
    }
}

/// Pops the current minimum, advances `prev`/`next`, re-enqueues unless the
/// schedule reports the zero instant, then invokes the run-callback. The
/// loop holds no lock across the callback.
///
/// `before_job` is called synchronously here, before `next` is recomputed:
/// for a schedule like `OnceSchedule` that gates `next()` on an in-flight
/// flag, this is what keeps the entry from being re-enqueued while its one
/// and only execution is still running.
fn fire(queue: &PriorityQueue<JobHandle>) {
    let Some(mut entry) = queue.pop() else {
        return;
    };
    let now = Utc::now();
    entry.prev = Some(now);
    entry.callback.schedule.before_job();
    let next = entry.callback.schedule.next(now);
    let callback = entry.callback.on_fire.clone();
    let job_id = entry.job_id.clone();

    match next {
        Some(next_time) => {
            entry.next = next_time;
            queue.add(entry);
        }
        None => {
            debug!(job_id = %job_id, "schedule exhausted, not re-enqueuing");
        }
    }

    callback(job_id, now);
}
