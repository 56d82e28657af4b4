// crates/server/src/session.rs
//! Per-connection stream controller.
//!
//! One session serves one job. It emits the cached snapshot first, then
//! forwards bus events in order, and closes on whichever happens first:
//!
//! | Close path        | Trigger                                      | Last event         |
//! |-------------------|----------------------------------------------|--------------------|
//! | terminal          | terminal bus event or terminal cache entry   | `complete`         |
//! | fallback_poll     | job store shows a terminal job               | `complete`         |
//! | timeout           | hard session limit                           | `complete`/`error` |
//! | already_terminal  | job terminal when the session opens          | `complete`         |
//! | disconnected      | client went away (stream dropped)            | none               |
//!
//! Between events a keep-alive comment is emitted every heartbeat interval.
//! Closing is guarded: the first path to close wins, and releasing the bus
//! subscription happens exactly once on every exit path.

use std::sync::Arc;

use sponge_core::{
    sanitize_error, BusMessage, EventBus, JobOutcome, JobStore, Snapshot, StateCache, StoreError,
    Subscription,
};
use sponge_types::{JobId, JobSnapshot, JobStatus, ProgressEvent, StreamEvent};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_stream::Stream;

use crate::config::StreamConfig;
use crate::metrics;

/// Written to the job store when a session outlives the hard limit.
pub const JOB_TIMEOUT_MESSAGE: &str = "Job timed out after exceeding the maximum allowed duration.";
/// Sent when the timed-out job no longer exists.
pub const STREAM_TIMEOUT_ERROR: &str = "Generation timed out. Please try again.";
/// Sent when the job store fails while building a terminal payload.
pub const STREAM_GENERIC_ERROR: &str = "Something went wrong. Please try again.";
pub const JOB_NOT_FOUND_ERROR: &str = "Job not found";

/// Shared backends a session reads from.
#[derive(Clone)]
pub struct StreamBackends {
    pub cache: Arc<dyn StateCache>,
    pub bus: Arc<dyn EventBus>,
    pub store: Arc<dyn JobStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    AlreadyTerminal,
    Terminal,
    FallbackPoll,
    Timeout,
    NotFound,
    StoreError,
    Disconnected,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::AlreadyTerminal => "already_terminal",
            CloseReason::Terminal => "terminal",
            CloseReason::FallbackPoll => "fallback_poll",
            CloseReason::Timeout => "timeout",
            CloseReason::NotFound => "not_found",
            CloseReason::StoreError => "store_error",
            CloseReason::Disconnected => "disconnected",
        }
    }
}

/// Close-once guard owning the session's subscription.
struct SessionGuard {
    job_id: JobId,
    subscription: Option<Subscription>,
    closed: Option<CloseReason>,
    opened_at: Instant,
}

impl SessionGuard {
    fn open(job_id: JobId) -> Self {
        metrics::record_session_opened();
        tracing::info!(job_id = %job_id, "Stream session opened");
        Self {
            job_id,
            subscription: None,
            closed: None,
            opened_at: Instant::now(),
        }
    }

    /// Returns `false` if another path already closed the session.
    fn close(&mut self, reason: CloseReason) -> bool {
        if self.closed.is_some() {
            return false;
        }
        self.closed = Some(reason);
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        metrics::record_session_closed(reason.as_str());
        tracing::info!(
            job_id = %self.job_id,
            reason = reason.as_str(),
            elapsed_secs = self.opened_at.elapsed().as_secs(),
            "Stream session closed"
        );
        true
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close(CloseReason::Disconnected);
    }
}

enum Step {
    Bus(BusMessage),
    Poll,
    Timeout,
    Heartbeat,
}

async fn next_message(subscription: &mut Option<Subscription>) -> BusMessage {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// Stream session for one job.
pub struct StreamSession {
    job_id: JobId,
    backends: StreamBackends,
    config: StreamConfig,
}

impl StreamSession {
    pub fn new(job_id: impl Into<JobId>, backends: StreamBackends, config: StreamConfig) -> Self {
        Self {
            job_id: job_id.into(),
            backends,
            config,
        }
    }

    /// Run the session. Dropping the stream unsubscribes and ends it.
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let StreamSession {
            job_id,
            backends,
            config,
        } = self;

        async_stream::stream! {
            let StreamBackends { cache, bus, store } = backends;
            let mut guard = SessionGuard::open(job_id.clone());
            let deadline = guard.opened_at + config.session_timeout;

            match store.get(&job_id).await {
                Ok(Some(job)) if job.status.is_terminal() => {
                    guard.close(CloseReason::AlreadyTerminal);
                    yield StreamEvent::Complete(job.snapshot(None));
                    return;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    guard.close(CloseReason::NotFound);
                    yield StreamEvent::error(JOB_NOT_FOUND_ERROR);
                    return;
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Job store read failed on stream open");
                    guard.close(CloseReason::StoreError);
                    yield StreamEvent::error(STREAM_GENERIC_ERROR);
                    return;
                }
            }

            // Subscribe before reading the cache so nothing published in
            // between is lost. A duplicate is harmless to the client merge.
            match bus.subscribe(&job_id).await {
                Ok(subscription) => guard.subscription = Some(subscription),
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Bus subscribe failed, relying on fallback poll");
                }
            }

            // The job may have finished between the store read and here.
            if let Some(event) = cached_event(cache.as_ref(), store.as_ref(), &job_id).await {
                if event.is_terminal() {
                    guard.close(CloseReason::Terminal);
                    yield event;
                    return;
                }
                yield event;
            }

            let start = Instant::now();
            let mut heartbeat = interval_at(start + config.heartbeat, config.heartbeat);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut poll = interval_at(start + config.poll_interval, config.poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let timeout = sleep_until(deadline);
            tokio::pin!(timeout);

            loop {
                let step = tokio::select! {
                    biased;
                    message = next_message(&mut guard.subscription) => Step::Bus(message),
                    _ = poll.tick() => Step::Poll,
                    _ = &mut timeout => Step::Timeout,
                    _ = heartbeat.tick() => Step::Heartbeat,
                };

                match step {
                    Step::Bus(BusMessage::Event(event)) if event.is_terminal() => {
                        let terminal = terminal_from_bus(store.as_ref(), &event).await;
                        if guard.close(CloseReason::Terminal) {
                            yield terminal;
                        }
                        return;
                    }
                    Step::Bus(BusMessage::Event(event)) => {
                        yield StreamEvent::Progress(event.into());
                    }
                    Step::Bus(BusMessage::Lagged(missed)) => {
                        tracing::warn!(job_id = %job_id, missed, "Stream subscriber lagged, re-sending snapshot");
                        // Whatever is still buffered predates the snapshot.
                        let skipped_terminal = guard
                            .subscription
                            .as_mut()
                            .and_then(|subscription| subscription.skip_buffered());
                        let resend = match skipped_terminal {
                            Some(event) => Some(terminal_from_bus(store.as_ref(), &event).await),
                            None => cached_event(cache.as_ref(), store.as_ref(), &job_id).await,
                        };
                        if let Some(event) = resend {
                            if event.is_terminal() {
                                if guard.close(CloseReason::Terminal) {
                                    yield event;
                                }
                                return;
                            }
                            yield event;
                        }
                    }
                    Step::Bus(BusMessage::Closed) => {
                        tracing::warn!(job_id = %job_id, "Bus channel closed, relying on fallback poll");
                        if let Some(mut subscription) = guard.subscription.take() {
                            subscription.close();
                        }
                    }
                    Step::Poll => match store.get(&job_id).await {
                        Ok(Some(job)) if job.status.is_terminal() => {
                            if guard.close(CloseReason::FallbackPoll) {
                                tracing::info!(job_id = %job_id, status = %job.status, "Fallback poll found terminal job");
                                yield StreamEvent::Complete(job.snapshot(None));
                            }
                            return;
                        }
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            if guard.close(CloseReason::NotFound) {
                                yield StreamEvent::error(JOB_NOT_FOUND_ERROR);
                            }
                            return;
                        }
                        Err(e) => {
                            tracing::debug!(job_id = %job_id, error = %e, "Fallback poll failed");
                        }
                    },
                    Step::Timeout => {
                        tracing::warn!(job_id = %job_id, "Stream session hit the hard timeout");
                        let terminal = terminal_on_timeout(store.as_ref(), &job_id).await;
                        if guard.close(CloseReason::Timeout) {
                            yield terminal;
                        }
                        return;
                    }
                    Step::Heartbeat => {
                        yield StreamEvent::KeepAlive;
                    }
                }
            }
        }
    }
}

/// Latest cached state: `complete` for a terminal entry, `progress`
/// otherwise. Cache failures count as absent.
async fn cached_event(
    cache: &dyn StateCache,
    store: &dyn JobStore,
    job_id: &str,
) -> Option<StreamEvent> {
    let snapshot = match cache.get(job_id).await {
        Ok(snapshot) => snapshot?,
        Err(e) => {
            tracing::debug!(job_id = %job_id, error = %e, "State cache read failed");
            return None;
        }
    };
    let event = match snapshot {
        Snapshot::Terminal(snapshot) => StreamEvent::Complete(snapshot),
        Snapshot::Progress(event) if event.is_terminal() => terminal_from_bus(store, &event).await,
        progress => StreamEvent::Progress(progress.to_payload()),
    };
    Some(event)
}

/// Build the `complete` event for a terminal bus event.
pub(crate) async fn terminal_from_bus(store: &dyn JobStore, event: &ProgressEvent) -> StreamEvent {
    match store.get(&event.job_id).await {
        Ok(Some(job)) if job.status.is_terminal() => StreamEvent::Complete(job.snapshot(None)),
        Ok(_) => StreamEvent::Complete(synthesize_terminal(event)),
        Err(e) => {
            tracing::error!(job_id = %event.job_id, error = %e, "Job store read failed for terminal event");
            StreamEvent::error(STREAM_GENERIC_ERROR)
        }
    }
}

/// Terminal snapshot built from the bus event alone.
pub(crate) fn synthesize_terminal(event: &ProgressEvent) -> JobSnapshot {
    let mut snapshot = JobSnapshot::new(event.job_id.clone(), event.phase);
    if event.phase == JobStatus::Failed {
        snapshot.error = sanitize_error(Some(&event.message));
    }
    snapshot
}

/// Fail the job if it is still running, then build the final event.
pub(crate) async fn terminal_on_timeout(store: &dyn JobStore, job_id: &str) -> StreamEvent {
    match store
        .finish(job_id, JobOutcome::Failed(JOB_TIMEOUT_MESSAGE.to_string()))
        .await
    {
        Ok(true) => tracing::warn!(job_id = %job_id, "Job marked failed after session timeout"),
        Ok(false) => {}
        Err(StoreError::NotFound(_)) => return StreamEvent::error(STREAM_TIMEOUT_ERROR),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Could not mark timed-out job as failed");
            return StreamEvent::error(STREAM_GENERIC_ERROR);
        }
    }

    match store.get(job_id).await {
        Ok(Some(job)) => StreamEvent::Complete(job.snapshot(None)),
        Ok(None) => StreamEvent::error(STREAM_TIMEOUT_ERROR),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Job store read failed after timeout");
            StreamEvent::error(STREAM_GENERIC_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use sponge_core::{
        Job, MemoryEventBus, MemoryJobStore, MemoryStateCache, ProgressPublisher, Snapshot,
    };
    use sponge_types::{JobResult, ProgressPayload};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    struct Harness {
        cache: Arc<MemoryStateCache>,
        bus: MemoryEventBus,
        store: Arc<MemoryJobStore>,
        publisher: ProgressPublisher,
    }

    impl Harness {
        async fn new() -> Self {
            let cache = Arc::new(MemoryStateCache::default());
            let bus = MemoryEventBus::new();
            let store = Arc::new(MemoryJobStore::new());
            store.insert(Job::new("j1", "https://example.com")).await.unwrap();
            let publisher = ProgressPublisher::new(cache.clone(), Arc::new(bus.clone()), store.clone());
            Self {
                cache,
                bus,
                store,
                publisher,
            }
        }

        fn backends(&self) -> StreamBackends {
            StreamBackends {
                cache: self.cache.clone(),
                bus: Arc::new(self.bus.clone()),
                store: self.store.clone(),
            }
        }

        fn session(&self) -> std::pin::Pin<Box<dyn Stream<Item = StreamEvent> + Send>> {
            Box::pin(StreamSession::new("j1", self.backends(), StreamConfig::default()).into_stream())
        }

        async fn seed(&self, completed: u64) -> ProgressEvent {
            let event = ProgressEvent::new("j1", JobStatus::Extracting, "Fetching pages").with_counts(completed, 10);
            self.publisher.publish(event.clone()).await;
            event
        }
    }

    /// Paused-clock timers fire on millisecond ticks.
    fn assert_within(elapsed: Duration, secs: u64) {
        let expected = Duration::from_secs(secs);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "expected ~{secs}s, got {elapsed:?}"
        );
    }

    fn progress(event: &ProgressEvent) -> StreamEvent {
        StreamEvent::Progress(ProgressPayload::from(event.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_snapshot_first_then_live_events() {
        let h = Harness::new().await;
        let seeded = h.seed(1).await;
        let mut stream = h.session();

        assert_eq!(stream.next().await, Some(progress(&seeded)));
        assert_eq!(h.bus.subscriber_count("j1"), 1);

        let second = h.seed(2).await;
        let third = h.seed(3).await;
        assert_eq!(stream.next().await, Some(progress(&second)));
        assert_eq!(stream.next().await, Some(progress(&third)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_at_open_skips_subscription() {
        let h = Harness::new().await;
        h.publisher
            .finish("j1", JobOutcome::Completed(JobResult::default()))
            .await
            .unwrap();
        let mut stream = h.session();

        match stream.next().await {
            Some(StreamEvent::Complete(snapshot)) => assert_eq!(snapshot.status, JobStatus::Completed),
            other => panic!("expected complete, got {other:?}"),
        }
        assert_eq!(stream.next().await, None);
        assert_eq!(h.bus.channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_bus_event_sends_stored_record() {
        let h = Harness::new().await;
        h.seed(9).await;
        let mut stream = h.session();
        stream.next().await;

        let result = JobResult {
            total_pages: 10,
            pages_processed: 9,
            pages_failed: 1,
            ..Default::default()
        };
        h.publisher
            .finish("j1", JobOutcome::Completed(result.clone()))
            .await
            .unwrap();

        match stream.next().await {
            Some(StreamEvent::Complete(snapshot)) => {
                assert_eq!(snapshot.status, JobStatus::Completed);
                assert_eq!(snapshot.result, Some(result));
                assert!(snapshot.progress.is_none());
            }
            other => panic!("expected complete, got {other:?}"),
        }
        assert_eq!(stream.next().await, None);
        assert_eq!(h.bus.channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_poll_closes_when_bus_event_is_lost() {
        let h = Harness::new().await;
        h.seed(1).await;
        let mut stream = h.session();
        let opened = Instant::now();
        stream.next().await;

        // Terminal state reaches the store but never the bus.
        h.store
            .finish("j1", JobOutcome::Failed("Rate limit exceeded".into()))
            .await
            .unwrap();

        let mut last = None;
        while let Some(event) = stream.next().await {
            last = Some(event);
        }
        match last {
            Some(StreamEvent::Complete(snapshot)) => {
                assert_eq!(snapshot.status, JobStatus::Failed);
                assert_eq!(snapshot.error.as_deref(), Some("Rate limit exceeded"));
            }
            other => panic!("expected complete, got {other:?}"),
        }
        assert_within(opened.elapsed(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_every_interval() {
        let h = Harness::new().await;
        h.seed(1).await;
        let mut stream = h.session();
        let opened = Instant::now();
        stream.next().await;

        assert_eq!(stream.next().await, Some(StreamEvent::KeepAlive));
        assert_within(opened.elapsed(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_timeout_fails_stuck_job() {
        let h = Harness::new().await;
        let mut stream = h.session();
        let opened = Instant::now();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert_within(opened.elapsed(), 300);
        let (last, rest) = events.split_last().unwrap();
        assert!(rest.iter().all(|e| *e == StreamEvent::KeepAlive));
        match last {
            StreamEvent::Complete(snapshot) => {
                assert_eq!(snapshot.status, JobStatus::Failed);
                assert_eq!(snapshot.error.as_deref(), Some(JOB_TIMEOUT_MESSAGE));
            }
            other => panic!("expected complete, got {other:?}"),
        }
        assert_eq!(
            h.store.get("j1").await.unwrap().unwrap().status,
            JobStatus::Failed
        );
        assert_eq!(h.bus.channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagged_subscriber_gets_snapshot_again() {
        let h = Harness::new().await;
        h.seed(0).await;
        let mut stream = h.session();
        stream.next().await;

        let mut latest = None;
        for n in 1..=70 {
            latest = Some(h.seed(n).await);
        }

        let latest = latest.unwrap();
        let resent_at = Instant::now();
        assert_eq!(stream.next().await, Some(progress(&latest)));

        // Buffered checkpoints older than the snapshot are not replayed.
        assert_eq!(stream.next().await, Some(StreamEvent::KeepAlive));
        assert_within(resent_at.elapsed(), 15);

        let fresh = h.seed(71).await;
        assert_eq!(stream.next().await, Some(progress(&fresh)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_lost_in_lag_still_closes() {
        let h = Harness::new().await;
        h.seed(0).await;
        let mut stream = h.session();
        stream.next().await;

        for n in 1..=70 {
            h.seed(n).await;
        }
        h.publisher
            .finish("j1", JobOutcome::Completed(JobResult::default()))
            .await
            .unwrap();

        match stream.next().await {
            Some(StreamEvent::Complete(snapshot)) => assert_eq!(snapshot.status, JobStatus::Completed),
            other => panic!("expected complete, got {other:?}"),
        }
        assert_eq!(stream.next().await, None);
        assert_eq!(h.bus.channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_cache_entry_at_open_completes_and_closes() {
        let h = Harness::new().await;
        // Store still reads pending, but the job finished before the cache read.
        let mut done = JobSnapshot::new("j1", JobStatus::Completed);
        done.result = Some(JobResult {
            total_pages: 3,
            pages_processed: 3,
            ..Default::default()
        });
        h.cache.put("j1", Snapshot::Terminal(done.clone())).await.unwrap();
        let mut stream = h.session();
        let opened = Instant::now();

        assert_eq!(stream.next().await, Some(StreamEvent::Complete(done)));
        assert_eq!(stream.next().await, None);
        assert!(opened.elapsed() < Duration::from_secs(1));
        assert_eq!(h.bus.channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_releases_subscription() {
        let h = Harness::new().await;
        h.seed(1).await;
        let mut stream = h.session();
        stream.next().await;
        assert_eq!(h.bus.channel_count(), 1);

        drop(stream);
        assert_eq!(h.bus.channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_sends_error() {
        let h = Harness::new().await;
        let mut stream = Box::pin(
            StreamSession::new("missing", h.backends(), StreamConfig::default()).into_stream(),
        );
        assert_eq!(stream.next().await, Some(StreamEvent::error(JOB_NOT_FOUND_ERROR)));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_synthesized_terminal_sanitizes_error() {
        let event = ProgressEvent::new("j1", JobStatus::Failed, "thread 'main' panicked");
        let snapshot = synthesize_terminal(&event);
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some(sponge_core::GENERIC_JOB_ERROR));
        assert!(snapshot.result.is_none());

        let cancelled = synthesize_terminal(&ProgressEvent::new("j1", JobStatus::Cancelled, "Job cancelled"));
        assert!(cancelled.error.is_none());
    }

    #[tokio::test]
    async fn test_timeout_for_missing_job_is_an_error_event() {
        let store = MemoryJobStore::new();
        assert_eq!(
            terminal_on_timeout(&store, "gone").await,
            StreamEvent::error(STREAM_TIMEOUT_ERROR)
        );
    }

    #[tokio::test]
    async fn test_timeout_keeps_existing_terminal_state() {
        let store = MemoryJobStore::new();
        store.insert(Job::new("j1", "https://example.com")).await.unwrap();
        store.finish("j1", JobOutcome::Cancelled).await.unwrap();

        match terminal_on_timeout(&store, "j1").await {
            StreamEvent::Complete(snapshot) => assert_eq!(snapshot.status, JobStatus::Cancelled),
            other => panic!("expected complete, got {other:?}"),
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl JobStore for UnavailableStore {
        async fn get(&self, _: &str) -> Result<Option<Job>, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
        async fn insert(&self, _: Job) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
        async fn set_status(&self, _: &str, _: JobStatus) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
        async fn finish(&self, _: &str, _: JobOutcome) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_yields_generic_error() {
        let event = ProgressEvent::new("j1", JobStatus::Completed, "Generation complete");
        assert_eq!(
            terminal_from_bus(&UnavailableStore, &event).await,
            StreamEvent::error(STREAM_GENERIC_ERROR)
        );

        let backends = StreamBackends {
            cache: Arc::new(MemoryStateCache::default()),
            bus: Arc::new(MemoryEventBus::new()),
            store: Arc::new(UnavailableStore),
        };
        let mut stream = Box::pin(StreamSession::new("j1", backends, StreamConfig::default()).into_stream());
        assert_eq!(stream.next().await, Some(StreamEvent::error(STREAM_GENERIC_ERROR)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_cache_entry_kinds() {
        let cache = MemoryStateCache::default();
        let store = MemoryJobStore::new();

        let checkpoint = ProgressEvent::new("j1", JobStatus::Extracting, "Fetching pages").with_counts(2, 5);
        cache.put("j1", Snapshot::Progress(checkpoint.clone())).await.unwrap();
        assert_eq!(cached_event(&cache, &store, "j1").await, Some(progress(&checkpoint)));

        cache
            .put("j1", Snapshot::Terminal(JobSnapshot::new("j1", JobStatus::Cancelled)))
            .await
            .unwrap();
        match cached_event(&cache, &store, "j1").await {
            Some(StreamEvent::Complete(snapshot)) => assert_eq!(snapshot.status, JobStatus::Cancelled),
            other => panic!("unexpected {other:?}"),
        }

        // Terminal checkpoint with no stored record falls back to a synthesized one.
        let failed = ProgressEvent::new("j2", JobStatus::Failed, "Rate limit exceeded");
        cache.put("j2", Snapshot::Progress(failed)).await.unwrap();
        match cached_event(&cache, &store, "j2").await {
            Some(StreamEvent::Complete(snapshot)) => {
                assert_eq!(snapshot.status, JobStatus::Failed);
                assert_eq!(snapshot.error.as_deref(), Some("Rate limit exceeded"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(cached_event(&cache, &store, "other").await, None);
    }
}
