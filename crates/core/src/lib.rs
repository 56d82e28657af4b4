// crates/core/src/lib.rs
//! Shared backends for job progress streaming: the state cache, the event
//! bus, the job store contract, and the publisher that writes to all three.

pub mod bus;
pub mod cache;
pub mod error;
pub mod publisher;
pub mod runner;
pub mod sanitize;
pub mod store;

pub use bus::{BusMessage, EventBus, MemoryEventBus, Subscription};
pub use cache::{MemoryStateCache, Snapshot, StateCache, DEFAULT_SNAPSHOT_TTL};
pub use error::{BusError, CacheError, StoreError};
pub use publisher::ProgressPublisher;
pub use runner::{JobHandle, JobRunner, ProgressReporter};
pub use sanitize::{sanitize_error, GENERIC_JOB_ERROR};
pub use store::{Job, JobOutcome, JobStore, MemoryJobStore};
