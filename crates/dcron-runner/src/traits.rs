//! The runner's named external collaborators.

use async_trait::async_trait;
use dcron_core::{DcronResult, Job, JobId, JobStateRecord};

/// Audit sink for state transitions. Best-effort: errors are logged and
/// treated as transient for that one cycle, never fatal to the node.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_job_state(&self, id: &JobId, state: JobStateRecord) -> DcronResult<()>;
}

/// The capability passed to an [`Executor`], letting it delete the job it
/// was invoked for (e.g. a self-terminating job) by submitting a Delete to
/// the replicated log.
#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(&self, id: &JobId) -> DcronResult<()>;
}

/// Runs a job's actual user work. Out of scope for this crate to implement;
/// only the contract is defined here.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, job: &Job, remover: &dyn Remover) -> DcronResult<()>;
}
