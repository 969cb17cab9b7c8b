//! # Latency Bus - Result/Event Sink
//!
//! Every lifecycle point of the harness (request sent, response matched,
//! orphan, responder-started round trip, error, batch start/finish,
//! transport status) is published here as a [`HarnessEvent`]. Presentation
//! code subscribes with an [`EventFilter`] and receives a [`Subscription`]
//! handle; dropping the handle unsubscribes.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  subscribe()  ┌──────────────┐
//! │   Harness    │ ────────────→ │  Event Bus   │ ────────────→ │  Reporter /  │
//! │              │               │ (broadcast)  │               │   Metrics    │
//! └──────────────┘               └──────────────┘               └──────────────┘
//! ```
//!
//! ## Ordering
//!
//! Events reach every subscriber in publish order. Publish order follows the
//! order in which the triggering operations completed, so concurrent-batch
//! responses appear in arrival order, not send order.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, HarnessEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;
