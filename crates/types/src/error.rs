// crates/types/src/error.rs
use thiserror::Error;

/// Errors raised while decoding a wire event.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("Malformed JSON in {event} event: {source}")]
    MalformedJson {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Payload of {event} event is neither a snapshot nor a delta")]
    UnrecognizedPayload { event: String },
}

impl WireError {
    pub fn malformed(event: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedJson {
            event: event.into(),
            source,
        }
    }
}
