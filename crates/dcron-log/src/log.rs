//! The `ReplicatedLog` contract: the embedded KV/consensus engine itself is
//! out of scope (it is a named external collaborator), but a node needs
//! something that behaves like one to run against in tests and in
//! single-node operation. [`MemoryLog`] is that something: an in-process,
//! non-persistent log with the same put/delete/watch-from-revision-1/leader
//! shape a real consensus engine would expose behind this trait.

use async_trait::async_trait;
use dcron_core::DcronError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};

/// One ordered change in the replicated log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub revision: u64,
    pub kind: LogEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogEventKind {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// The interface `dcron-log`'s applier consumes: an ordered, replicated
/// put/delete log plus a leadership query. A production deployment wires a
/// real consensus engine behind this trait; that engine's own internals are
/// out of scope.
#[async_trait]
pub trait ReplicatedLog: Send + Sync {
    /// Submits a put for `key`. Durably committed once this returns `Ok`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DcronError>;

    /// Submits a delete for `key`.
    async fn delete(&self, key: &str) -> Result<(), DcronError>;

    /// Subscribes to the ordered change stream, starting from revision 1 —
    /// i.e. including every event already committed, not just future ones.
    fn watch(&self) -> mpsc::UnboundedReceiver<LogEvent>;

    /// Returns the id of the current cluster leader.
    async fn leader_id(&self) -> Result<String, DcronError>;

    /// This node's own id, for leader-gating comparisons (`self == leader`).
    fn self_id(&self) -> &str;
}

/// In-memory, single-process [`ReplicatedLog`]. Non-persistent by design —
/// matching the node's own "wipe on every start" data directory policy —
/// and always reports itself as leader, since there is only ever one node
/// in this implementation.
pub struct MemoryLog {
    self_id: String,
    revision: AtomicU64,
    events: parking_lot::RwLock<Vec<LogEvent>>,
    tx: broadcast::Sender<LogEvent>,
}

impl MemoryLog {
    pub fn new(self_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(4096);
        Self {
            self_id: self_id.into(),
            revision: AtomicU64::new(0),
            events: parking_lot::RwLock::new(Vec::new()),
            tx,
        }
    }

    fn commit(&self, kind: LogEventKind) -> LogEvent {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let event = LogEvent { revision, kind };
        self.events.write().push(event.clone());
        let _ = self.tx.send(event.clone());
        event
    }
}

#[async_trait]
impl ReplicatedLog for MemoryLog {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DcronError> {
        self.commit(LogEventKind::Put {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DcronError> {
        self.commit(LogEventKind::Delete {
            key: key.to_string(),
        });
        Ok(())
    }

    fn watch(&self) -> mpsc::UnboundedReceiver<LogEvent> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let backlog = self.events.read().clone();
        let mut live = self.tx.subscribe();

        tokio::spawn(async move {
            for event in backlog {
                if out_tx.send(event).is_err() {
                    return;
                }
            }
            loop {
                match live.recv().await {
                    Ok(event) => {
                        if out_tx.send(event).is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        out_rx
    }

    async fn leader_id(&self) -> Result<String, DcronError> {
        Ok(self.self_id.clone())
    }

    fn self_id(&self) -> &str {
        &self.self_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watch_replays_events_committed_before_subscribing() {
        let log = MemoryLog::new("node-a");
        log.put("j1", b"payload".to_vec()).await.unwrap();

        let mut rx = log.watch();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.revision, 1);
        assert!(matches!(event.kind, LogEventKind::Put { .. }));
    }

    #[tokio::test]
    async fn single_node_is_always_its_own_leader() {
        let log = MemoryLog::new("node-a");
        assert_eq!(log.leader_id().await.unwrap(), "node-a");
        assert_eq!(log.self_id(), "node-a");
    }

    #[tokio::test]
    async fn revisions_increase_monotonically() {
        let log = MemoryLog::new("node-a");
        log.put("j1", vec![]).await.unwrap();
        log.put("j2", vec![]).await.unwrap();
        log.delete("j1").await.unwrap();

        let mut rx = log.watch();
        let mut revisions = Vec::new();
        for _ in 0..3 {
            revisions.push(rx.recv().await.unwrap().revision);
        }
        assert_eq!(revisions, vec![1, 2, 3]);
    }
}
