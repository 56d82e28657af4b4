// crates/client/src/transport.rs
//! HTTP driver feeding the reducer.
//!
//! One spawned task per watched job: initial point-read, then a connection
//! loop that decodes event-stream frames, reconnects with exponential
//! backoff while the job is non-terminal, and enforces the stall window.
//! The stall deadline starts before the initial read, moves forward on
//! every received frame and keeps running across reconnects.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use sponge_types::{JobId, SseParser, StreamEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::fetch_job;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::state::{ClientState, Effect, Input};

/// Opens progress streams against one server.
#[derive(Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl StreamClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http(config, reqwest::Client::new())
    }

    pub fn with_http(config: ClientConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config: Arc::new(config),
        }
    }

    /// Start following a job. Must be called inside a Tokio runtime.
    pub fn watch(&self, job_id: impl Into<JobId>) -> StreamHandle {
        let job_id = job_id.into();
        let (tx, rx) = watch::channel(ClientState::new(job_id.clone()));
        let cancel = CancellationToken::new();

        let driver = Driver {
            http: self.http.clone(),
            config: self.config.clone(),
            job_id,
            tx,
        };
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let job_id = driver.job_id.clone();
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(%job_id, "Stream watch cancelled");
                }
                _ = driver.run() => {}
            }
        });

        StreamHandle {
            state: rx,
            cancel,
            task,
        }
    }
}

/// Live view of one watched job. Dropping it stops the driver.
pub struct StreamHandle {
    state: watch::Receiver<ClientState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Current state.
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Wait until the state reaches DONE, ERROR or STALLED.
    ///
    /// Returns the last published state if the driver exits first.
    pub async fn settled(&mut self) -> ClientState {
        if let Ok(state) = self.state.wait_for(|s| s.phase.is_final()).await {
            return state.clone();
        }
        self.state.borrow().clone()
    }

    /// Stop following the job.
    pub fn close(self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Outcome {
    /// The reducer asked to stop.
    Closed,
    /// The connection went away while the job may still be running.
    Lost(String),
}

struct Driver {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    job_id: JobId,
    tx: watch::Sender<ClientState>,
}

impl Driver {
    fn dispatch(&self, input: Input) -> Effect {
        let now = Instant::now();
        let mut effect = Effect::Continue;
        self.tx.send_modify(|state| effect = state.apply(input, now));
        effect
    }

    async fn run(self) {
        let stall = sleep(self.config.stall_window);
        tokio::pin!(stall);

        let loaded = tokio::select! {
            biased;
            _ = &mut stall => {
                self.stall();
                return;
            }
            loaded = fetch_job(&self.http, &self.config, &self.job_id) => loaded,
        };
        match loaded {
            Ok(snapshot) => {
                if self.dispatch(Input::Loaded(snapshot)) == Effect::Close {
                    info!(job_id = %self.job_id, "Job already finished");
                    return;
                }
            }
            Err(ClientError::NotFound(_)) => {
                self.dispatch(Input::NotFound);
                return;
            }
            Err(e) if !e.is_transient() => {
                warn!(job_id = %self.job_id, error = %e, "Initial job load failed");
                self.dispatch(Input::LoadFailed(e.to_string()));
                return;
            }
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "Initial job load failed, opening stream anyway");
            }
        }

        let mut backoff = self.config.initial_backoff;

        loop {
            self.dispatch(Input::Connecting);
            let reason = match self.connect(stall.as_mut(), &mut backoff).await {
                Outcome::Closed => return,
                Outcome::Lost(reason) => reason,
            };

            if self.dispatch(Input::TransportLost(reason)) == Effect::Close {
                return;
            }
            debug!(job_id = %self.job_id, backoff_ms = backoff.as_millis() as u64, "Reconnecting");
            tokio::select! {
                biased;
                _ = &mut stall => {
                    self.dispatch(Input::StallElapsed);
                    return;
                }
                _ = sleep(backoff) => {}
            }
            backoff = next_backoff(backoff, self.config.max_backoff);
        }
    }

    async fn connect(&self, mut stall: Pin<&mut Sleep>, backoff: &mut Duration) -> Outcome {
        let request = self
            .http
            .get(self.config.stream_url(&self.job_id))
            .header(ACCEPT, "text/event-stream")
            .send();

        let response = tokio::select! {
            biased;
            _ = &mut stall => return self.stall(),
            response = request => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => return Outcome::Lost(e.to_string()),
        };

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        if !is_event_stream {
            return Outcome::Lost(format!("HTTP {}", response.status()));
        }

        let mut parser = SseParser::new();
        let body = response.bytes_stream();
        tokio::pin!(body);
        loop {
            let chunk = tokio::select! {
                biased;
                _ = &mut stall => return self.stall(),
                chunk = body.next() => chunk,
            };
            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Outcome::Lost(e.to_string()),
                None => {
                    parser.finish();
                    return Outcome::Lost("stream ended".to_string());
                }
            };

            for frame in parser.feed(&bytes) {
                stall
                    .as_mut()
                    .reset(Instant::now() + self.config.stall_window);
                let input = match StreamEvent::from_frame(&frame) {
                    Ok(event) => {
                        *backoff = self.config.initial_backoff;
                        Input::Event(event)
                    }
                    Err(e) => {
                        debug!(job_id = %self.job_id, error = %e, "Dropping malformed frame");
                        Input::Malformed
                    }
                };
                if self.dispatch(input) == Effect::Close {
                    return Outcome::Closed;
                }
            }
        }
    }

    fn stall(&self) -> Outcome {
        warn!(job_id = %self.job_id, window_secs = self.config.stall_window.as_secs(), "Stream stalled");
        self.dispatch(Input::StallElapsed);
        Outcome::Closed
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
