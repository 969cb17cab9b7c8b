//! Service Layer
//!
//! Orchestrates the domain types behind the inbound port and drives the
//! outbound ports.

pub mod harness;
pub mod probe;
pub mod reverse;

pub use harness::{FrameOutcome, LatencyHarness};
pub use probe::{ResponseOutcome, TransportProbe};
pub use reverse::ReverseProbeTracker;
