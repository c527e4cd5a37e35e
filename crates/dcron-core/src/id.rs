//! Job identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique job identifier, also the replicated log's KV key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Builds a job id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ids_hash_equal() {
        let a = JobId::new("j1");
        let b = JobId::from("j1");
        assert_eq!(a, b);
    }

    #[test]
    fn display_matches_source_string() {
        let id = JobId::new("j1");
        assert_eq!(id.to_string(), "j1");
    }
}
