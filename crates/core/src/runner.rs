// crates/core/src/runner.rs
//! Background runner for generation pipelines.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use sponge_types::{JobId, JobResult, JobStatus, ProgressEvent};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::publisher::ProgressPublisher;
use crate::store::JobOutcome;

/// Handed to a pipeline for reporting its progress.
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    publisher: ProgressPublisher,
}

impl ProgressReporter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Enter a new pipeline phase. Returns `false` if the job already ended.
    pub async fn phase(&self, phase: JobStatus, message: impl Into<String>) -> Result<bool, StoreError> {
        self.publisher.transition(&self.job_id, phase, message).await
    }

    /// Publish an intra-phase checkpoint such as `completed / total` counts.
    pub async fn checkpoint(&self, mut event: ProgressEvent) {
        event.job_id.clone_from(&self.job_id);
        self.publisher.publish(event).await;
    }
}

/// Handle to a started pipeline.
pub struct JobHandle {
    pub job_id: JobId,
    task: JoinHandle<JobStatus>,
}

impl JobHandle {
    /// Wait for the pipeline to end and return the status of its outcome.
    pub async fn join(self) -> JobStatus {
        match self.task.await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Job task aborted");
                JobStatus::Failed
            }
        }
    }
}

/// Spawns pipelines and writes their outcome through the publisher.
///
/// A pipeline that returns `Ok` completes the job, `Err` fails it, and a
/// [`cancel`](Self::cancel) drops the pipeline future and cancels the job.
pub struct JobRunner {
    publisher: ProgressPublisher,
    cancels: Arc<RwLock<HashMap<JobId, oneshot::Sender<()>>>>,
}

impl JobRunner {
    pub fn new(publisher: ProgressPublisher) -> Self {
        Self {
            publisher,
            cancels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn publisher(&self) -> &ProgressPublisher {
        &self.publisher
    }

    /// Start `pipeline` for an already stored job.
    pub fn start<F, Fut>(&self, job_id: impl Into<JobId>, pipeline: F) -> JobHandle
    where
        F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<JobResult, String>> + Send + 'static,
    {
        let job_id = job_id.into();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        match self.cancels.write() {
            Ok(mut cancels) => {
                cancels.insert(job_id.clone(), cancel_tx);
            }
            Err(e) => tracing::error!("RwLock poisoned writing cancel map: {e}"),
        }

        let reporter = ProgressReporter {
            job_id: job_id.clone(),
            publisher: self.publisher.clone(),
        };
        let publisher = self.publisher.clone();
        let cancels = Arc::clone(&self.cancels);
        let task_job_id = job_id.clone();

        let task = tokio::spawn(async move {
            let job_id = task_job_id;
            tracing::info!(job_id = %job_id, "Job started");

            let outcome = tokio::select! {
                result = pipeline(reporter) => match result {
                    Ok(result) => JobOutcome::Completed(result),
                    Err(message) => {
                        tracing::warn!(job_id = %job_id, error = %message, "Job pipeline failed");
                        JobOutcome::Failed(message)
                    }
                },
                Ok(()) = &mut cancel_rx => JobOutcome::Cancelled,
            };
            let status = outcome.status();

            match cancels.write() {
                Ok(mut cancels) => {
                    cancels.remove(&job_id);
                }
                Err(e) => tracing::error!("RwLock poisoned writing cancel map: {e}"),
            }

            match publisher.finish(&job_id, outcome).await {
                Ok(_) => status,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
                    status
                }
            }
        });

        JobHandle { job_id, task }
    }

    /// Signal a running pipeline to stop. Returns `false` when the job is not
    /// running under this runner.
    pub fn cancel(&self, job_id: &str) -> bool {
        let sender = match self.cancels.write() {
            Ok(mut cancels) => cancels.remove(job_id),
            Err(e) => {
                tracing::error!("RwLock poisoned writing cancel map: {e}");
                None
            }
        };
        sender.is_some_and(|tx| tx.send(()).is_ok())
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        match self.cancels.read() {
            Ok(cancels) => cancels.contains_key(job_id),
            Err(e) => {
                tracing::error!("RwLock poisoned reading cancel map: {e}");
                false
            }
        }
    }

    pub fn active_count(&self) -> usize {
        match self.cancels.read() {
            Ok(cancels) => cancels.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading cancel map: {e}");
                0
            }
        }
    }
}
