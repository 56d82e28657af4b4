// crates/client/src/error.rs
use thiserror::Error;

/// Errors from the job point-read and stream transport.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::NotFound(_) | ClientError::Decode(_) => false,
            ClientError::Status { status } => *status >= 500,
            ClientError::Http(_) => true,
        }
    }
}
