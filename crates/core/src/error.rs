// crates/core/src/error.rs
use sponge_types::{JobId, JobStatus};
use thiserror::Error;

/// Errors from the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("Terminal status {0} must be written with an outcome")]
    TerminalStatus(JobStatus),

    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the state cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("State cache unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
}
