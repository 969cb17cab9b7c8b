//! Outbound Ports (Driven Ports)
//!
//! What the harness needs from the outside world: somewhere to send probes
//! and somewhere to report events.

use latency_bus::HarnessEvent;
use latency_types::{ProbeRequest, ReverseReply, TransportKind};

use crate::error::TransportError;

/// Sending half of one transport.
///
/// `dispatch` must not block: adapters push onto an unbounded queue and a
/// background task does the I/O.
pub trait ProbeTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Whether a dispatch right now could reach the responder.
    fn is_ready(&self) -> bool;

    /// Fire-and-forget send of one probe.
    fn dispatch(&self, request: &ProbeRequest) -> Result<(), TransportError>;

    /// Answer a probe the responder started. Transports without a way back
    /// to the responder refuse.
    fn reply(&self, reply: &ReverseReply) -> Result<(), TransportError> {
        let _ = reply;
        Err(TransportError::Unsupported(self.kind()))
    }
}

/// Receives every lifecycle event, in operation order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: HarnessEvent);
}

/// Raw inbound frame, decoded by the harness.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// Structured value from the message channel
    Structured(serde_json::Value),
    /// Text frame from the socket
    Encoded(String),
}

/// Everything a transport pushes toward the receipt loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    Frame {
        transport: TransportKind,
        payload: FramePayload,
    },
    Status {
        transport: TransportKind,
        ready: bool,
    },
}
