// crates/types/src/job.rs
//! Job snapshot and result shapes shared by the point-read endpoint and the
//! `complete` stream event.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::progress::ProgressView;
use crate::status::JobStatus;

/// Opaque job identifier.
pub type JobId = String;

/// Output metadata of a successfully generated job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(default)]
pub struct JobResult {
    pub llms_txt: String,
    pub llms_full_txt_url: Option<String>,
    pub total_pages: u64,
    pub pages_processed: u64,
    pub pages_failed: u64,
    pub generation_time_seconds: f64,
    pub llm_calls_made: u64,
    pub llm_cost_usd: f64,
}

/// Self-contained representation of a job, sufficient to render the UI
/// without any prior event.
///
/// Invariants upheld by producers: `result` is `Some` only when
/// `status == Completed`; `error` is `Some` only when `status == Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<ProgressView>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// A snapshot with only id and status set.
    pub fn new(id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            progress: None,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
