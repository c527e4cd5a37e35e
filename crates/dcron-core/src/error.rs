//! Node-wide error type.

use thiserror::Error;

/// Result type used throughout the `dcron-*` crates.
pub type DcronResult<T> = Result<T, DcronError>;

/// Errors that can occur anywhere in a dcron node.
#[derive(Debug, Error)]
pub enum DcronError {
    /// An SRV record could not be resolved at startup; fatal.
    #[error("cannot resolve service: {0}")]
    CannotResolveService(String),

    /// Config loading/validation failed at startup; fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A log Put/Delete timed out or was rejected.
    #[error("transient write failure: {0}")]
    TransientWrite(String),

    /// A cron expression or once descriptor failed to parse.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A log payload could not be decoded at apply time.
    #[error("decode error: {0}")]
    Decode(String),

    /// A Storage or Executor plug-in returned an error.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// A schedule descriptor carried an unrecognised `type` tag.
    #[error("unknown schedule type: {0}")]
    UnknownScheduleType(u8),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DcronError {
    /// True for errors the caller may reasonably retry (surfaced as 503 over HTTP).
    pub fn is_transient(&self) -> bool {
        matches!(self, DcronError::TransientWrite(_) | DcronError::Plugin(_))
    }

    /// True for errors that should abort node startup rather than degrade gracefully.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            DcronError::CannotResolveService(_) | DcronError::Configuration(_)
        )
    }

    /// True for errors caused by bad caller input (surfaced as 400 over HTTP).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            DcronError::InvalidInput(_) | DcronError::UnknownScheduleType(_)
        )
    }
}
