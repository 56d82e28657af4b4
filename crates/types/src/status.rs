// crates/types/src/status.rs
//! Job lifecycle status.
//!
//! | Status | Terminal | Pipeline rank |
//! |--------|----------|---------------|
//! | pending | no | 0 |
//! | discovering | no | 1 |
//! | extracting | no | 2 |
//! | enhancing | no | 3 |
//! | generating | no | 4 |
//! | completed | yes | 5 |
//! | failed | yes | 5 |
//! | cancelled | yes | 5 |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Status of a job, shared by the job record and the `phase` of progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Discovering,
    Extracting,
    Enhancing,
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Pending,
        JobStatus::Discovering,
        JobStatus::Extracting,
        JobStatus::Enhancing,
        JobStatus::Generating,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// `completed`, `failed` and `cancelled` never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Position in pipeline order. All terminal statuses share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Discovering => 1,
            JobStatus::Extracting => 2,
            JobStatus::Enhancing => 3,
            JobStatus::Generating => 4,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Discovering => "discovering",
            JobStatus::Extracting => "extracting",
            JobStatus::Enhancing => "enhancing",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
