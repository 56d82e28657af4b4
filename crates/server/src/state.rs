// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sponge_core::{
    EventBus, JobRunner, JobStore, MemoryEventBus, MemoryJobStore, MemoryStateCache,
    ProgressPublisher, StateCache,
};

use crate::config::StreamConfig;
use crate::session::StreamBackends;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Cache, bus and job store shared by every stream session.
    pub backends: StreamBackends,
    /// Writes progress and final job state.
    pub publisher: ProgressPublisher,
    /// Runs simulated pipelines in demo mode.
    pub runner: Arc<JobRunner>,
    pub stream_config: StreamConfig,
    /// Step delay of the simulated pipeline; `Some` mounts the job
    /// create/cancel endpoints.
    pub demo: Option<Duration>,
}

impl AppState {
    /// Create state over the given backends.
    pub fn new(
        cache: Arc<dyn StateCache>,
        bus: Arc<dyn EventBus>,
        store: Arc<dyn JobStore>,
        stream_config: StreamConfig,
        demo: Option<Duration>,
    ) -> Arc<Self> {
        let publisher = ProgressPublisher::new(cache.clone(), bus.clone(), store.clone());
        Arc::new(Self {
            start_time: Instant::now(),
            backends: StreamBackends { cache, bus, store },
            runner: Arc::new(JobRunner::new(publisher.clone())),
            publisher,
            stream_config,
            demo,
        })
    }

    /// In-process backends with default timers.
    pub fn in_memory() -> Arc<Self> {
        Self::new(
            Arc::new(MemoryStateCache::default()),
            Arc::new(MemoryEventBus::new()),
            Arc::new(MemoryJobStore::new()),
            StreamConfig::default(),
            None,
        )
    }

    pub fn store(&self) -> &dyn JobStore {
        self.backends.store.as_ref()
    }

    pub fn cache(&self) -> &dyn StateCache {
        self.backends.cache.as_ref()
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
