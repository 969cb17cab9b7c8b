//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for presentation code
//! - Driven Ports (outbound) - transports and the event sink

pub mod inbound;
pub mod outbound;

pub use inbound::HarnessApi;
pub use outbound::{EventSink, FramePayload, ProbeTransport, TransportSignal};
