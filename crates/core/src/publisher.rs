// crates/core/src/publisher.rs
//! Producer side of the progress stream.
//!
//! Every publication is written to the state cache first and then to the
//! event bus, so a stream opening between the two still sees it. Cache and
//! bus failures are logged and dropped: progress reporting must never fail
//! the job itself.

use std::sync::Arc;

use sponge_types::{JobStatus, ProgressEvent};

use crate::bus::EventBus;
use crate::cache::{Snapshot, StateCache};
use crate::error::StoreError;
use crate::sanitize::sanitize_error;
use crate::store::{JobOutcome, JobStore};

#[derive(Clone)]
pub struct ProgressPublisher {
    cache: Arc<dyn StateCache>,
    bus: Arc<dyn EventBus>,
    store: Arc<dyn JobStore>,
}

impl ProgressPublisher {
    pub fn new(
        cache: Arc<dyn StateCache>,
        bus: Arc<dyn EventBus>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self { cache, bus, store }
    }

    /// Cache and broadcast a progress event.
    pub async fn publish(&self, event: ProgressEvent) {
        let job_id = event.job_id.clone();

        if let Err(e) = self.cache.put(&job_id, Snapshot::Progress(event.clone())).await {
            tracing::warn!(job_id = %job_id, error = %e, "Progress cache write failed (non-fatal)");
        }

        match self.bus.publish(&job_id, event).await {
            Ok(receivers) => {
                tracing::trace!(job_id = %job_id, receivers, "Progress published");
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Progress publish failed (non-fatal)");
            }
        }
    }

    /// Write a job's final state, cache the terminal snapshot, and broadcast
    /// a terminal progress event.
    ///
    /// Returns `Ok(false)` without publishing when the job had already ended.
    pub async fn finish(&self, job_id: &str, outcome: JobOutcome) -> Result<bool, StoreError> {
        let status = outcome.status();
        let message = match &outcome {
            JobOutcome::Completed(_) => "Generation complete".to_string(),
            JobOutcome::Failed(raw) => sanitize_error(Some(raw)).unwrap_or_default(),
            JobOutcome::Cancelled => "Job cancelled".to_string(),
        };

        if !self.store.finish(job_id, outcome).await? {
            tracing::debug!(job_id = %job_id, status = %status, "Job already terminal, finish ignored");
            return Ok(false);
        }

        match self.store.get(job_id).await {
            Ok(Some(job)) => {
                if let Err(e) = self.cache.put(job_id, Snapshot::Terminal(job.snapshot(None))).await {
                    tracing::warn!(job_id = %job_id, error = %e, "Terminal cache write failed (non-fatal)");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Could not read job after finish");
            }
        }

        let event = ProgressEvent::new(job_id, status, message);
        if let Err(e) = self.bus.publish(job_id, event).await {
            tracing::warn!(job_id = %job_id, error = %e, "Terminal publish failed (non-fatal)");
        }

        tracing::info!(job_id = %job_id, status = %status, "Job finished");
        Ok(true)
    }

    /// Record a phase transition in the store and publish it.
    pub async fn transition(
        &self,
        job_id: &str,
        phase: JobStatus,
        message: impl Into<String>,
    ) -> Result<bool, StoreError> {
        if !self.store.set_status(job_id, phase).await? {
            return Ok(false);
        }
        self.publish(ProgressEvent::new(job_id, phase, message)).await;
        Ok(true)
    }
}
