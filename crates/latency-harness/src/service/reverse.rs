//! Responder-side correlation for probes the responder starts itself.
//!
//! Flow:
//! 1. `begin()` registers the token and builds the probe to send
//! 2. The first `received` reply stamps the acknowledgement
//! 3. The `response` reply resolves the entry and reports the legs

use latency_bus::HarnessEvent;
use latency_types::{CorrelationToken, Millis, ReverseProbe, ReverseReply, TransportKind};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Clock, LegTimings, MonotonicClock, PendingEntry, PendingTable, ProbeOrigin};
use crate::error::HarnessError;
use crate::ports::EventSink;

/// Pending table of one responder, with its own clock.
pub struct ReverseProbeTracker {
    transport: TransportKind,
    pending: PendingTable,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl ReverseProbeTracker {
    pub fn new(transport: TransportKind, sink: Arc<dyn EventSink>) -> Self {
        Self {
            transport,
            pending: PendingTable::new(),
            clock: Arc::new(MonotonicClock::new()),
            sink,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register `token` and build the probe carrying it.
    pub fn begin(
        &mut self,
        token: CorrelationToken,
        message: String,
    ) -> Result<ReverseProbe, HarnessError> {
        let start_time = self.clock.now_millis();
        self.pending.register(PendingEntry {
            token: token.clone(),
            transport: self.transport,
            sent_at: start_time,
            sequence_index: None,
            origin: ProbeOrigin::Reverse,
            message: message.clone(),
            acknowledged_at: None,
        })?;

        Ok(ReverseProbe {
            probe_id: token,
            message,
            start_time,
        })
    }

    /// Forget a probe that never left.
    pub fn cancel(&mut self, token: &CorrelationToken) {
        self.pending.evict(self.transport, token);
    }

    /// Apply one reply. Returns the legs once the response arrives.
    ///
    /// Replies for unknown tokens are reported as orphans.
    pub fn on_reply(&mut self, reply: &ReverseReply) -> Result<Option<LegTimings>, HarnessError> {
        let now = self.clock.now_millis();

        match reply {
            ReverseReply::Received { probe_id } => {
                if self.pending.acknowledge(self.transport, probe_id, now) {
                    debug!(transport = %self.transport, token = %probe_id, "Probe acknowledged");
                    Ok(None)
                } else {
                    Err(self.orphan(probe_id, now))
                }
            }
            ReverseReply::Response {
                probe_id,
                response_ms,
            } => {
                let Some(entry) = self.pending.resolve(self.transport, probe_id) else {
                    return Err(self.orphan(probe_id, now));
                };

                let legs =
                    LegTimings::measure(entry.sent_at, entry.acknowledged_at, now, *response_ms);
                debug!(
                    transport = %self.transport,
                    token = %probe_id,
                    total_ms = legs.total_ms,
                    "Responder probe answered"
                );
                self.sink.emit(HarnessEvent::ReverseRoundTrip {
                    transport: self.transport,
                    token: entry.token,
                    sent_at: entry.sent_at,
                    received_at: now,
                    total_ms: legs.total_ms,
                    outbound_ms: legs.outbound_ms,
                    processing_ms: legs.processing_ms,
                    return_ms: legs.return_ms,
                    message: format!("Responder round trip via {}", self.transport),
                });
                Ok(Some(legs))
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count(Some(self.transport))
    }

    fn orphan(&self, token: &CorrelationToken, at: Millis) -> HarnessError {
        warn!(transport = %self.transport, token = %token, "Reply for unknown responder probe");
        self.sink.emit(HarnessEvent::Orphan {
            transport: self.transport,
            token: token.clone(),
            received_at: at,
            message: format!("No pending responder probe for token {token}"),
        });
        HarnessError::OrphanResponse {
            transport: self.transport,
            token: token.clone(),
        }
    }
}
