// crates/core/src/bus.rs
//! Per-job publish/subscribe channels.
//!
//! Delivery reaches only consumers subscribed at publish time; a late
//! subscriber must read the state cache for anything it missed. Order is
//! preserved per channel.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sponge_types::{JobId, ProgressEvent};
use tokio::sync::broadcast;

use crate::error::BusError;

/// Per-channel buffer before a slow subscriber starts lagging.
pub const CHANNEL_CAPACITY: usize = 64;

/// Outcome of waiting on a [`Subscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Event(ProgressEvent),
    /// The subscriber fell behind and `n` events were dropped.
    Lagged(u64),
    /// The publisher side is gone; no further events will arrive.
    Closed,
}

/// Releases a channel subscription when a [`Subscription`] is closed.
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, job_id: &str);
}

/// Handle yielding the events of one job's channel.
///
/// Closing is idempotent and also happens on drop, so every exit path of a
/// consumer releases the channel exactly once.
pub struct Subscription {
    job_id: JobId,
    rx: Option<broadcast::Receiver<ProgressEvent>>,
    release: Option<Arc<dyn Unsubscribe>>,
}

impl Subscription {
    pub fn new(
        job_id: impl Into<JobId>,
        rx: broadcast::Receiver<ProgressEvent>,
        release: Arc<dyn Unsubscribe>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            rx: Some(rx),
            release: Some(release),
        }
    }

    pub fn is_open(&self) -> bool {
        self.rx.is_some()
    }

    /// Wait for the next message. A closed subscription yields `Closed`.
    pub async fn recv(&mut self) -> BusMessage {
        let Some(rx) = self.rx.as_mut() else {
            return BusMessage::Closed;
        };
        match rx.recv().await {
            Ok(event) => BusMessage::Event(event),
            Err(broadcast::error::RecvError::Lagged(n)) => BusMessage::Lagged(n),
            Err(broadcast::error::RecvError::Closed) => BusMessage::Closed,
        }
    }

    /// Discard everything already buffered, so the next `recv` waits for a
    /// fresh publication. Returns the last terminal event among the
    /// discarded ones.
    pub fn skip_buffered(&mut self) -> Option<ProgressEvent> {
        let rx = self.rx.as_mut()?;
        let mut terminal = None;
        let mut skipped = 0usize;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    skipped += 1;
                    if event.is_terminal() {
                        terminal = Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        if skipped > 0 {
            tracing::debug!(job_id = %self.job_id, skipped, "Skipped buffered bus events");
        }
        terminal
    }

    /// Release the channel. Returns `true` only on the call that released it.
    pub fn close(&mut self) -> bool {
        // Drop the receiver first so the bus sees the reduced count.
        let had_rx = self.rx.take().is_some();
        match self.release.take() {
            Some(release) => {
                release.unsubscribe(&self.job_id);
                true
            }
            None => had_rx,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("job_id", &self.job_id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Fan-out of progress events, one logical channel per job id.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish to the job's channel. Returns how many subscribers received it.
    async fn publish(&self, job_id: &str, event: ProgressEvent) -> Result<usize, BusError>;

    /// Open a subscription to the job's channel.
    async fn subscribe(&self, job_id: &str) -> Result<Subscription, BusError>;
}

#[derive(Default)]
struct Channels {
    senders: DashMap<JobId, broadcast::Sender<ProgressEvent>>,
}

impl Unsubscribe for Channels {
    fn unsubscribe(&self, job_id: &str) {
        // The channel goes away with its last subscriber; a publish to a job
        // with no subscribers never creates one.
        self.senders
            .remove_if(job_id, |_, tx| tx.receiver_count() == 0);
    }
}

/// In-process [`EventBus`] backed by one `broadcast` channel per job.
#[derive(Clone, Default)]
pub struct MemoryEventBus {
    channels: Arc<Channels>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs with at least one live subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.senders.len()
    }

    /// Subscribers currently attached to the job's channel.
    pub fn subscriber_count(&self, job_id: &str) -> usize {
        self.channels
            .senders
            .get(job_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, job_id: &str, event: ProgressEvent) -> Result<usize, BusError> {
        let Some(tx) = self.channels.senders.get(job_id) else {
            return Ok(0);
        };
        // `send` only fails when every receiver is gone.
        Ok(tx.send(event).unwrap_or(0))
    }

    async fn subscribe(&self, job_id: &str) -> Result<Subscription, BusError> {
        let rx = self
            .channels
            .senders
            .entry(job_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        let release: Arc<dyn Unsubscribe> = self.channels.clone();
        Ok(Subscription::new(job_id, rx, release))
    }
}
