//! # Event Publisher
//!
//! The publishing side of the bus and its in-memory broadcast implementation.

use crate::events::{EventFilter, HarnessEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Publishing side of the bus.
///
/// Publishing never blocks and never fails: the harness emits while holding
/// its state lock, so a slow subscriber only ever lags.
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Returns how many subscribers it reached.
    fn publish(&self, event: HarnessEvent) -> usize;

    /// Events published over the bus lifetime, including undelivered ones.
    fn events_published(&self) -> u64;
}

/// Broadcast bus: every subscriber sees every event and filters locally.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<HarnessEvent>,
    published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Start receiving events that match `filter`.
    ///
    /// Only events published after this call are delivered. Dropping the
    /// returned handle unsubscribes.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, transports = ?filter.transports, "Subscribed");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Same as [`subscribe`](Self::subscribe), as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Live subscriptions and streams.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: HarnessEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();

        // An error only means nobody is subscribed.
        let reached = self.sender.send(event).unwrap_or(0);
        trace!(topic = ?topic, reached, "Event published");
        reached
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
