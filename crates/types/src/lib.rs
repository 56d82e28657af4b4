// crates/types/src/lib.rs
//! Shared data model and wire protocol for job progress streaming.
//!
//! Both the stream server and the stream client depend on this crate, so the
//! shape of every event on the wire is defined exactly once.

pub mod error;
pub mod job;
pub mod progress;
pub mod sse;
pub mod status;
pub mod wire;

pub use error::WireError;
pub use job::{JobId, JobResult, JobSnapshot};
pub use progress::{ProgressEvent, ProgressView};
pub use sse::{SseFrame, SseParser};
pub use status::JobStatus;
pub use wire::{ErrorPayload, ProgressPayload, StreamEvent};
