//! Error types for brahms-core.

use thiserror::Error;

/// Result type for brahms-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A protocol parameter is out of range.
    #[error("invalid params: {name}={value}: {reason}")]
    InvalidParams {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Per-peer network failures.
///
/// These never reach the caller of a round; the engine treats them as
/// "that peer did not answer".
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer could not be reached.
    #[error("peer {0} unreachable")]
    Unreachable(String),

    /// The peer did not answer in time.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// The peer answered with a non-success status.
    #[error("peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    /// A message could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Any other transport level failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Encoding(e.to_string())
    }
}
