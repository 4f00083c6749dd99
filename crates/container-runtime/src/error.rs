//! Runtime Error Types

use thiserror::Error;

/// Errors raised while querying the container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Could not reach the runtime socket
    #[error("Connection to container runtime failed: {0}")]
    Connection(String),

    /// Runtime did not answer in time
    #[error("Container runtime did not respond within {0}ms")]
    Timeout(u64),

    /// Runtime answered with a non-success status
    #[error("Container runtime returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Invalid runtime response: {0}")]
    InvalidResponse(String),

    /// Injected or otherwise unavailable runtime
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::InvalidResponse(err.to_string())
    }
}
