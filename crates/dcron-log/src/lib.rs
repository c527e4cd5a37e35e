//! Replicated-log applier: the single-threaded bridge between the KV/consensus
//! engine's change stream (a named external collaborator, out of scope here)
//! and the node's local job map + scheduler.
//!
//! ```text
//! dcron-log
//!   ├── log      ReplicatedLog trait + MemoryLog (test/single-node impl)
//!   ├── waiter   correlation-keyed one-shot rendezvous
//!   └── applier  strictly-ordered apply loop
//! ```

mod applier;
mod log;
mod waiter;

pub use applier::{encode_put, ApplyOutcome, LogApplier};
pub use log::{LogEvent, LogEventKind, MemoryLog, ReplicatedLog};
pub use waiter::WaiterRegistry;
