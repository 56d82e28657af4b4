// crates/core/src/store.rs
//! Authoritative job records.
//!
//! The stream layer only needs "get job by id" and "write final state"; the
//! remaining operations exist for the job runner and the demo endpoints.
//! Terminal status is monotonic: once a job is completed, failed or
//! cancelled, every later write is ignored.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sponge_types::{JobId, JobResult, JobSnapshot, JobStatus, ProgressView};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::sanitize::sanitize_error;

/// Final state written when a job ends.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobResult),
    Failed(String),
    Cancelled,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Failed(_) => JobStatus::Failed,
            JobOutcome::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// A stored job record.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    /// Raw error message; only the sanitized form leaves the server.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            url: url.into(),
            status: JobStatus::Pending,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Build the client-facing snapshot. `result` is exposed only for
    /// completed jobs and `error` only for failed ones, sanitized.
    pub fn snapshot(&self, progress: Option<ProgressView>) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress,
            result: match self.status {
                JobStatus::Completed => self.result.clone(),
                _ => None,
            },
            error: match self.status {
                JobStatus::Failed => sanitize_error(self.error_message.as_deref()),
                _ => None,
            },
        }
    }
}

/// Contract of the persistent job store.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    async fn insert(&self, job: Job) -> Result<(), StoreError>;

    /// Move a non-terminal job to another non-terminal status.
    /// Returns `false` when the job is already terminal.
    async fn set_status(&self, id: &str, status: JobStatus) -> Result<bool, StoreError>;

    /// Write the final state. Returns `false` (and changes nothing) when the
    /// job is already terminal.
    async fn finish(&self, id: &str, outcome: JobOutcome) -> Result<bool, StoreError>;
}

/// In-process [`JobStore`].
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<bool, StoreError> {
        if status.is_terminal() {
            return Err(StoreError::TerminalStatus(status));
        }
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = status;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn finish(&self, id: &str, outcome: JobOutcome) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = outcome.status();
        match outcome {
            JobOutcome::Completed(result) => job.result = Some(result),
            JobOutcome::Failed(message) => job.error_message = Some(message),
            JobOutcome::Cancelled => {}
        }
        job.updated_at = now;
        job.completed_at = Some(now);
        Ok(true)
    }
}
