//! # Latency Types Crate
//!
//! Types shared by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Partitioned namespaces**: every token and statistic is tagged with a
//!   [`TransportKind`]; the two transports never share correlation state.
//! - **Wire stability**: [`ProbeRequest`], [`ProbeEcho`] and the
//!   responder-started [`ReverseProbe`] exchange serialize to the camelCase
//!   JSON shape both sides speak.
//! - **Single clock domain**: all [`Millis`] values handed to the harness come
//!   from the issuing side's monotonic clock.

pub mod errors;
pub mod payload;
pub mod token;
pub mod transport;

pub use errors::*;
pub use payload::*;
pub use token::CorrelationToken;
pub use transport::*;

/// Milliseconds on the issuing side's monotonic clock.
pub type Millis = f64;
