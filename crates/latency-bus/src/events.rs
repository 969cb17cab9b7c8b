//! # Harness Events
//!
//! Every event that flows through the bus. Variants map one-to-one onto the
//! lifecycle points of a probe and of a batch.

use latency_types::{BatchMode, CorrelationToken, ErrorKind, Millis, TransportKind};
use serde::{Deserialize, Serialize};

/// All events that can be published to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HarnessEvent {
    // =========================================================================
    // PROBE LIFECYCLE
    // =========================================================================
    /// A probe was registered and handed to its transport.
    RequestSent {
        transport: TransportKind,
        token: CorrelationToken,
        /// Position within the batch; `None` for single probes.
        sequence_index: Option<usize>,
        sent_at: Millis,
        message: String,
    },

    /// A response was matched to its pending entry.
    ResponseReceived {
        transport: TransportKind,
        token: CorrelationToken,
        sequence_index: Option<usize>,
        sent_at: Millis,
        received_at: Millis,
        /// `received_at - sent_at`, both on the issuing side's clock.
        elapsed_ms: Millis,
        /// Responder-reported processing time, if any.
        processing_ms: Option<Millis>,
        message: String,
    },

    /// A response arrived for a token with no pending entry.
    Orphan {
        transport: TransportKind,
        token: CorrelationToken,
        received_at: Millis,
        message: String,
    },

    /// A recovered error. Never terminates anything.
    Error {
        transport: Option<TransportKind>,
        token: Option<CorrelationToken>,
        kind: ErrorKind,
        at: Millis,
        message: String,
    },

    /// A probe started by the responder completed, split into legs.
    ReverseRoundTrip {
        transport: TransportKind,
        token: CorrelationToken,
        /// Send and receive times on the responder's clock.
        sent_at: Millis,
        received_at: Millis,
        total_ms: Millis,
        /// Send to acknowledgement; `None` if no acknowledgement arrived.
        outbound_ms: Option<Millis>,
        /// Handling time reported by the answering side.
        processing_ms: Millis,
        /// What the round trip leaves after the outbound leg and handling.
        return_ms: Option<Millis>,
        message: String,
    },

    // =========================================================================
    // BATCH LIFECYCLE
    // =========================================================================
    /// A batch entered the running state.
    BatchStarted {
        transport: TransportKind,
        mode: BatchMode,
        target_count: usize,
        started_at: Millis,
        message: String,
    },

    /// A batch returned to idle, either completed or aborted.
    BatchFinished {
        transport: TransportKind,
        mode: BatchMode,
        target_count: usize,
        completed_count: usize,
        /// Probes given up on by the optional timeout.
        abandoned_count: usize,
        aborted: bool,
        finished_at: Millis,
        message: String,
    },

    // =========================================================================
    // TRANSPORT STATUS
    // =========================================================================
    /// A transport connected or disconnected.
    TransportStatusChanged {
        transport: TransportKind,
        ready: bool,
        at: Millis,
        message: String,
    },
}

impl HarnessEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::RequestSent { .. } => EventTopic::Requests,
            Self::ResponseReceived { .. } => EventTopic::Responses,
            Self::Orphan { .. } => EventTopic::Orphans,
            Self::ReverseRoundTrip { .. } => EventTopic::ReverseProbes,
            Self::Error { .. } => EventTopic::Errors,
            Self::BatchStarted { .. } | Self::BatchFinished { .. } => EventTopic::Batches,
            Self::TransportStatusChanged { .. } => EventTopic::TransportStatus,
        }
    }

    /// Transport the event concerns, if any.
    #[must_use]
    pub fn transport(&self) -> Option<TransportKind> {
        match self {
            Self::RequestSent { transport, .. }
            | Self::ResponseReceived { transport, .. }
            | Self::Orphan { transport, .. }
            | Self::ReverseRoundTrip { transport, .. }
            | Self::BatchStarted { transport, .. }
            | Self::BatchFinished { transport, .. }
            | Self::TransportStatusChanged { transport, .. } => Some(*transport),
            Self::Error { transport, .. } => *transport,
        }
    }

    /// Correlation token the event concerns, if any.
    #[must_use]
    pub fn token(&self) -> Option<&CorrelationToken> {
        match self {
            Self::RequestSent { token, .. }
            | Self::ResponseReceived { token, .. }
            | Self::Orphan { token, .. }
            | Self::ReverseRoundTrip { token, .. } => Some(token),
            Self::Error { token, .. } => token.as_ref(),
            _ => None,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::RequestSent { message, .. }
            | Self::ResponseReceived { message, .. }
            | Self::Orphan { message, .. }
            | Self::ReverseRoundTrip { message, .. }
            | Self::Error { message, .. }
            | Self::BatchStarted { message, .. }
            | Self::BatchFinished { message, .. }
            | Self::TransportStatusChanged { message, .. } => message,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    Requests,
    Responses,
    Orphans,
    ReverseProbes,
    Errors,
    Batches,
    TransportStatus,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Transports to include. Empty means all transports; events without a
    /// transport only pass an empty transport list.
    pub transports: Vec<TransportKind>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            transports: Vec::new(),
        }
    }

    /// Create a filter for events about specific transports.
    #[must_use]
    pub fn for_transports(transports: Vec<TransportKind>) -> Self {
        Self {
            topics: Vec::new(),
            transports,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &HarnessEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let transport_match = self.transports.is_empty()
            || event
                .transport()
                .is_some_and(|transport| self.transports.contains(&transport));

        topic_match && transport_match
    }
}
