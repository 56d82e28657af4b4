// crates/client/src/state.rs
//! Client-side job state machine.
//!
//! ```text
//! IDLE -> CONNECTING      stream open
//! CONNECTING -> LIVE      first parsed event
//! LIVE -> LIVE            progress: snapshot replaces, delta merges
//! LIVE -> DONE            complete (or a terminal snapshot/delta)
//! LIVE -> ERROR           error event
//! LIVE -> STALLED         stall window elapsed without any event
//! IDLE -> ERROR           job not found, or a load error retrying will not fix
//! IDLE -> STALLED         no answer to the initial load within the stall window
//! any -> CONNECTING       transport dropped while the job is non-terminal
//! ```
//!
//! The reducer is pure: the transport feeds it [`Input`]s and acts on the
//! returned [`Effect`]. Once a final phase is reached every further input is
//! ignored.

use sponge_types::{JobId, JobSnapshot, JobStatus, ProgressPayload, ProgressView, StreamEvent};
use tokio::time::Instant;

/// Shown when the stall window elapses.
pub const STALL_MESSAGE: &str = "Generation appears to be stuck. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Live,
    Done,
    Error,
    Stalled,
}

impl Phase {
    /// No transition leaves a final phase.
    pub fn is_final(&self) -> bool {
        matches!(self, Phase::Done | Phase::Error | Phase::Stalled)
    }
}

/// What happened, as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Result of the initial point-read.
    Loaded(JobSnapshot),
    /// The initial point-read found no such job.
    NotFound,
    /// The initial point-read failed in a way retrying will not fix.
    LoadFailed(String),
    /// A stream connection is being opened.
    Connecting,
    /// A frame decoded into an event.
    Event(StreamEvent),
    /// A frame arrived but could not be decoded.
    Malformed,
    /// The connection dropped without a terminal event.
    TransportLost(String),
    /// No frame arrived for the whole stall window.
    StallElapsed,
}

/// What the transport must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Continue,
    /// Close the connection and stop.
    Close,
    /// Open a new connection after backing off.
    Reconnect,
}

/// State exposed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientState {
    pub job_id: JobId,
    pub phase: Phase,
    /// Last reconciled job view.
    pub data: Option<JobSnapshot>,
    pub connection_error: Option<String>,
    pub connected: bool,
    pub timed_out: bool,
    pub last_activity_at: Option<Instant>,
}

impl ClientState {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            phase: Phase::Idle,
            data: None,
            connection_error: None,
            connected: false,
            timed_out: false,
            last_activity_at: None,
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.data.as_ref().map(|d| d.status)
    }

    /// Apply one input.
    pub fn apply(&mut self, input: Input, now: Instant) -> Effect {
        if self.phase.is_final() {
            return Effect::Close;
        }

        match input {
            Input::Loaded(snapshot) => {
                let terminal = snapshot.is_terminal();
                self.replace(snapshot);
                if terminal {
                    self.finish(Phase::Done);
                    return Effect::Close;
                }
                Effect::Continue
            }
            Input::NotFound => {
                self.connection_error = Some("Job not found".to_string());
                self.finish(Phase::Error);
                Effect::Close
            }
            Input::LoadFailed(reason) => {
                self.connection_error = Some(reason);
                self.finish(Phase::Error);
                Effect::Close
            }
            Input::Connecting => {
                self.phase = Phase::Connecting;
                self.connected = false;
                Effect::Continue
            }
            Input::Event(event) => {
                self.touch(now);
                self.apply_event(event)
            }
            Input::Malformed => {
                self.touch(now);
                Effect::Continue
            }
            Input::TransportLost(reason) => {
                tracing::debug!(job_id = %self.job_id, %reason, "Stream connection lost");
                self.connected = false;
                self.phase = Phase::Connecting;
                Effect::Reconnect
            }
            Input::StallElapsed => {
                self.timed_out = true;
                self.connection_error = Some(STALL_MESSAGE.to_string());
                self.finish(Phase::Stalled);
                Effect::Close
            }
        }
    }

    fn apply_event(&mut self, event: StreamEvent) -> Effect {
        if self.phase != Phase::Live {
            self.phase = Phase::Live;
            self.connected = true;
        }

        match event {
            StreamEvent::KeepAlive => Effect::Continue,
            StreamEvent::Progress(ProgressPayload::Snapshot(snapshot)) => {
                if self.regresses(snapshot.status) {
                    return Effect::Continue;
                }
                let terminal = snapshot.is_terminal();
                self.replace(snapshot);
                if terminal {
                    self.finish(Phase::Done);
                    return Effect::Close;
                }
                Effect::Continue
            }
            StreamEvent::Progress(ProgressPayload::Delta(delta)) => {
                if self.merge_delta(delta) {
                    self.finish(Phase::Done);
                    return Effect::Close;
                }
                Effect::Continue
            }
            StreamEvent::Complete(snapshot) => {
                self.replace(snapshot);
                self.finish(Phase::Done);
                Effect::Close
            }
            StreamEvent::Error(payload) => {
                self.connection_error = Some(payload.error);
                self.finish(Phase::Error);
                Effect::Close
            }
        }
    }

    /// Merge a partial update. Returns `true` if the job became terminal.
    fn merge_delta(&mut self, delta: ProgressView) -> bool {
        if let Some(phase) = delta.phase {
            if self.regresses(phase) {
                return false;
            }
        }
        let job_id = self.job_id.clone();
        let data = self
            .data
            .get_or_insert_with(|| JobSnapshot::new(job_id, JobStatus::Pending));
        let progress = data.progress.get_or_insert_with(ProgressView::default);

        if let (Some(incoming), Some(known)) = (delta.timestamp, progress.timestamp) {
            if incoming < known {
                return false;
            }
        }

        // Counters belong to a phase; entering a new one starts them over.
        let same_phase = delta.phase.is_none() || delta.phase == Some(data.status);
        if !same_phase {
            progress.completed = None;
            progress.total = None;
            progress.current_url = None;
        }
        let completed = match (delta.completed, progress.completed) {
            (Some(incoming), Some(known)) => Some(incoming.max(known)),
            (incoming, known) => incoming.or(known),
        };

        overwrite(&mut progress.job_id, delta.job_id);
        overwrite(&mut progress.phase, delta.phase);
        overwrite(&mut progress.message, delta.message);
        overwrite(&mut progress.urls_found, delta.urls_found);
        overwrite(&mut progress.total, delta.total);
        overwrite(&mut progress.current_url, delta.current_url);
        overwrite(&mut progress.timestamp, delta.timestamp);
        progress.completed = completed;

        if let Some(phase) = delta.phase {
            data.status = phase;
        }
        data.status.is_terminal()
    }

    /// A status earlier in pipeline order than the one already known.
    fn regresses(&self, incoming: JobStatus) -> bool {
        self.status()
            .is_some_and(|current| incoming.rank() < current.rank())
    }

    fn replace(&mut self, snapshot: JobSnapshot) {
        self.data = Some(snapshot);
    }

    fn touch(&mut self, now: Instant) {
        self.last_activity_at = Some(now);
    }

    fn finish(&mut self, phase: Phase) {
        self.phase = phase;
        self.connected = false;
    }
}

fn overwrite<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}
