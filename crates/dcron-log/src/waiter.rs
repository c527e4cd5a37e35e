//! Correlation-keyed one-shot rendezvous: "submit to the replicated log,
//! await apply-back by id" is the only safe way to let a local API call
//! return only after a replicated write has actually applied.

use dcron_core::CorrelationId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;

/// A registry of outstanding waiters keyed by correlation id. `Trigger` is
/// idempotent: a second trigger for an id that's already been delivered (or
/// timed out and been dropped) is a silent no-op.
pub struct WaiterRegistry<T> {
    waiters: Mutex<HashMap<CorrelationId, oneshot::Sender<T>>>,
}

impl<T> WaiterRegistry<T> {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a waiter for `id`, returning the receiving half.
    pub fn register(&self, id: CorrelationId) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(id, tx);
        rx
    }

    /// Delivers `value` to the waiter for `id`, if still registered.
    pub fn trigger(&self, id: CorrelationId, value: T) {
        if let Some(tx) = self.waiters.lock().remove(&id) {
            let _ = tx.send(value);
        }
    }

    /// Unregisters `id` without delivering a value, for deadline cleanup.
    pub fn cancel(&self, id: &CorrelationId) {
        self.waiters.lock().remove(id);
    }

    /// Registers a waiter and awaits it with a deadline, cleaning up the
    /// registration on timeout so it can't be spuriously triggered later.
    pub async fn wait(&self, id: CorrelationId, timeout: Duration) -> Option<T> {
        let rx = self.register(id);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) | Err(_) => {
                self.cancel(&id);
                None
            }
        }
    }
}

impl<T> Default for WaiterRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
