// crates/types/src/progress.rs
//! Progress events emitted by the generation pipeline.
//!
//! [`ProgressEvent`] is the producer-side record: every field the pipeline
//! knows at the time of emission. [`ProgressView`] is the consumer-side shape
//! of the same JSON object with every field optional, because a delta on the
//! wire is not guaranteed to carry the full record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::job::JobId;
use crate::status::JobStatus;

/// A single progress publication for one job. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub phase: JobStatus,
    pub message: String,
    pub urls_found: Option<u64>,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    pub current_url: Option<String>,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Create an event stamped with the current time and no counters.
    pub fn new(job_id: impl Into<JobId>, phase: JobStatus, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            phase,
            message: message.into(),
            urls_found: None,
            completed: None,
            total: None,
            current_url: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_urls_found(mut self, urls_found: u64) -> Self {
        self.urls_found = Some(urls_found);
        self
    }

    /// Set the `completed / total` counters of an intra-phase checkpoint.
    pub fn with_counts(mut self, completed: u64, total: u64) -> Self {
        self.completed = Some(completed);
        self.total = Some(total);
        self
    }

    pub fn with_current_url(mut self, url: impl Into<String>) -> Self {
        self.current_url = Some(url.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Lenient view of a progress object. Absent and `null` fields both decode
/// to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
pub struct ProgressView {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub phase: Option<JobStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub urls_found: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub current_url: Option<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<ProgressEvent> for ProgressView {
    fn from(event: ProgressEvent) -> Self {
        Self {
            job_id: Some(event.job_id),
            phase: Some(event.phase),
            message: Some(event.message),
            urls_found: event.urls_found,
            completed: event.completed,
            total: event.total,
            current_url: event.current_url,
            timestamp: Some(event.timestamp),
        }
    }
}
