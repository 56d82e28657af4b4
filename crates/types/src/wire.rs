// crates/types/src/wire.rs
//! Events carried by the job progress stream.
//!
//! | Event name | Payload | Terminal |
//! |------------|---------|----------|
//! | `progress` | [`ProgressPayload`] (delta or full snapshot) | no |
//! | `complete` | [`JobSnapshot`] | yes |
//! | `error`    | [`ErrorPayload`] | yes |
//! | comment    | none (keep-alive) | no |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::WireError;
use crate::job::JobSnapshot;
use crate::progress::{ProgressEvent, ProgressView};
use crate::sse::SseFrame;
use crate::status::JobStatus;

pub const EVENT_PROGRESS: &str = "progress";
pub const EVENT_COMPLETE: &str = "complete";
pub const EVENT_ERROR: &str = "error";

/// Body of an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
pub struct ErrorPayload {
    pub error: String,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body of a `progress` event.
///
/// The wire does not tag which shape is sent; [`ProgressPayload::decode`] is
/// the only place that tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProgressPayload {
    /// A full job record; replaces the consumer's state.
    Snapshot(JobSnapshot),
    /// A partial update; merged onto the consumer's state.
    Delta(ProgressView),
}

impl ProgressPayload {
    /// Classify a decoded `progress` body.
    ///
    /// - an object with a string `id` and a recognised `status` that
    ///   deserializes as [`JobSnapshot`] is a snapshot
    /// - otherwise an object carrying `job_id` or `phase` that deserializes as
    ///   [`ProgressView`] is a delta
    /// - anything else is rejected
    pub fn decode(value: Value) -> Result<Self, WireError> {
        let Value::Object(map) = &value else {
            return Err(WireError::UnrecognizedPayload {
                event: EVENT_PROGRESS.into(),
            });
        };

        let looks_like_snapshot = map.get("id").is_some_and(Value::is_string)
            && map
                .get("status")
                .and_then(Value::as_str)
                .and_then(JobStatus::parse_str)
                .is_some();
        if looks_like_snapshot {
            if let Ok(snapshot) = serde_json::from_value::<JobSnapshot>(value.clone()) {
                return Ok(ProgressPayload::Snapshot(snapshot));
            }
        }

        if map.contains_key("job_id") || map.contains_key("phase") {
            return serde_json::from_value::<ProgressView>(value)
                .map(ProgressPayload::Delta)
                .map_err(|e| WireError::malformed(EVENT_PROGRESS, e));
        }

        Err(WireError::UnrecognizedPayload {
            event: EVENT_PROGRESS.into(),
        })
    }
}

impl From<ProgressEvent> for ProgressPayload {
    fn from(event: ProgressEvent) -> Self {
        ProgressPayload::Delta(event.into())
    }
}

/// One event on the progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(ProgressPayload),
    Complete(JobSnapshot),
    Error(ErrorPayload),
    KeepAlive,
}

impl StreamEvent {
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error(ErrorPayload::new(message))
    }

    /// Value of the `event:` line; `None` for keep-alive comments.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            StreamEvent::Progress(_) => Some(EVENT_PROGRESS),
            StreamEvent::Complete(_) => Some(EVENT_COMPLETE),
            StreamEvent::Error(_) => Some(EVENT_ERROR),
            StreamEvent::KeepAlive => None,
        }
    }

    /// A terminal event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete(_) | StreamEvent::Error(_))
    }

    /// JSON body of the `data:` line; `None` for keep-alive comments.
    pub fn data_json(&self) -> Option<String> {
        let json = match self {
            StreamEvent::Progress(payload) => serde_json::to_string(payload),
            StreamEvent::Complete(snapshot) => serde_json::to_string(snapshot),
            StreamEvent::Error(payload) => serde_json::to_string(payload),
            StreamEvent::KeepAlive => return None,
        };
        // Plain data types; serialization does not fail in practice.
        Some(json.unwrap_or_else(|_| "{}".to_string()))
    }

    /// Render as a complete event-stream block, terminator included.
    pub fn to_sse_text(&self) -> String {
        match (self.event_name(), self.data_json()) {
            (Some(name), Some(data)) => format!("event: {name}\ndata: {data}\n\n"),
            _ => ": heartbeat\n\n".to_string(),
        }
    }

    /// Decode a parsed frame.
    pub fn from_frame(frame: &SseFrame) -> Result<Self, WireError> {
        if frame.is_keep_alive() {
            return Ok(StreamEvent::KeepAlive);
        }
        // A data-only block defaults to the `message` type, which this
        // protocol never uses.
        let name = frame.event.as_deref().unwrap_or("message");
        match name {
            EVENT_PROGRESS => {
                let value: Value = serde_json::from_str(&frame.data)
                    .map_err(|e| WireError::malformed(name, e))?;
                ProgressPayload::decode(value).map(StreamEvent::Progress)
            }
            EVENT_COMPLETE => serde_json::from_str(&frame.data)
                .map(StreamEvent::Complete)
                .map_err(|e| WireError::malformed(name, e)),
            EVENT_ERROR => serde_json::from_str(&frame.data)
                .map(StreamEvent::Error)
                .map_err(|e| WireError::malformed(name, e)),
            other => Err(WireError::UnknownEvent(other.to_string())),
        }
    }
}
