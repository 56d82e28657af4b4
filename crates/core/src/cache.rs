// crates/core/src/cache.rs
//! Latest-known state per job, with a bounded lifetime.
//!
//! The cache answers "what is the state right now" for a stream that opens
//! between two publications. Absence is not an error: the job has not emitted
//! progress yet, or its entry expired.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use sponge_types::{JobId, JobSnapshot, ProgressEvent, ProgressPayload};
use tokio::time::Instant;

use crate::error::CacheError;

/// Matches the longest a job is allowed to run.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(300);

/// A cached entry: the latest progress event, or the full record once terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Progress(ProgressEvent),
    Terminal(JobSnapshot),
}

impl Snapshot {
    pub fn is_terminal(&self) -> bool {
        match self {
            Snapshot::Progress(event) => event.is_terminal(),
            Snapshot::Terminal(snapshot) => snapshot.is_terminal(),
        }
    }

    /// Body of the `progress` event used to replay this entry.
    pub fn to_payload(&self) -> ProgressPayload {
        match self {
            Snapshot::Progress(event) => ProgressPayload::from(event.clone()),
            Snapshot::Terminal(snapshot) => ProgressPayload::Snapshot(snapshot.clone()),
        }
    }
}

/// Key-value store of the latest [`Snapshot`] per job.
#[async_trait]
pub trait StateCache: Send + Sync {
    /// Overwrite the entry for `job_id` and reset its expiry.
    async fn put(&self, job_id: &str, snapshot: Snapshot) -> Result<(), CacheError>;

    /// Current entry for `job_id`, or `None` when absent or expired.
    async fn get(&self, job_id: &str) -> Result<Option<Snapshot>, CacheError>;
}

struct Entry {
    snapshot: Snapshot,
    expires_at: Instant,
}

/// In-process [`StateCache`] partitioned by job id.
pub struct MemoryStateCache {
    entries: DashMap<JobId, Entry>,
    ttl: Duration,
}

impl MemoryStateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStateCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_TTL)
    }
}

#[async_trait]
impl StateCache for MemoryStateCache {
    async fn put(&self, job_id: &str, snapshot: Snapshot) -> Result<(), CacheError> {
        self.entries.insert(
            job_id.to_string(),
            Entry {
                snapshot,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Snapshot>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(job_id) {
            if entry.expires_at > now {
                return Ok(Some(entry.snapshot.clone()));
            }
        }
        // Expired: remove lazily. The guard above is released before this.
        self.entries.remove_if(job_id, |_, entry| entry.expires_at <= now);
        Ok(None)
    }
}
