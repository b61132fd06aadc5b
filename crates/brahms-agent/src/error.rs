//! Error types for the agent.

use std::time::Duration;

use thiserror::Error;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Agent`](crate::Agent), tagged with the step that failed.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration cannot be used.
    #[error("{op}: invalid config: {reason}")]
    InvalidConfig { op: &'static str, reason: String },

    /// An IO call failed.
    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A deadline passed before the step completed.
    #[error("{op}: timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
}

impl Error {
    /// The step that failed, e.g. `"listen"`, `"params"`, `"join"` or `"shutdown"`.
    pub fn op(&self) -> &'static str {
        match self {
            Error::InvalidConfig { op, .. } | Error::Io { op, .. } | Error::Timeout { op, .. } => *op,
        }
    }

    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            op,
            reason: reason.into(),
        }
    }
}
