//! # Latency Harness
//!
//! Round-trip latency measurement for two transports: a structured message
//! channel and a WebSocket channel.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `PendingTable`: in-flight tokens per transport
//!   - `BatchRun`: batch counters and the next-step decision
//!   - `StatisticsAggregator`: count/min/max/avg per transport
//!   - `LegTimings`: per-leg split of a responder-started round trip
//!   - `TokenMinter`, `Clock`, `HarnessConfig`
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `HarnessApi`: Driving port (presentation code)
//!   - `ProbeTransport`, `EventSink`: Driven ports
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `LatencyHarness`: implements `HarnessApi`
//!   - `TransportProbe`: mint, register, dispatch
//!   - `ReverseProbeTracker`: correlation on the responder side
//!
//! - **Adapters Layer** (`adapters/`): External connections
//!   - `ChannelTransport` / `ChannelResponder`
//!   - `SocketTransport` / `SocketResponder`
//!   - `run_receipt_loop`, `expiry_task`
//!
//! ## Invariants
//!
//! - A token is registered before its probe is dispatched.
//! - A token resolves at most once; every later echo is an orphan.
//! - At most one batch runs at a time.
//! - Sequential batches never have two probes of their transport in flight.
//! - A finished batch has `completed + abandoned == target` and nothing active.
//!
//! ## Wiring
//!
//! ```ignore
//! use latency_harness::adapters::{channel_link, run_receipt_loop, ChannelResponder};
//! use latency_harness::{HarnessApi, HarnessConfig, LatencyHarness, ResponderConfig};
//! use latency_bus::InMemoryEventBus;
//! use std::sync::Arc;
//!
//! let bus = Arc::new(InMemoryEventBus::new());
//! let harness = Arc::new(LatencyHarness::new(HarnessConfig::default(), bus.clone()));
//!
//! let (signals_tx, signals_rx) = tokio::sync::mpsc::unbounded_channel();
//! let (transport, endpoint) = channel_link();
//! let responder = ChannelResponder::new(ResponderConfig::default(), bus.clone())
//!     .spawn(endpoint, signals_tx);
//! harness.attach_transport(Arc::new(transport));
//!
//! let (_stop, stop_rx) = tokio::sync::watch::channel(false);
//! tokio::spawn(run_receipt_loop(harness.clone(), signals_rx, stop_rx));
//!
//! harness.start_batch(TransportKind::ChannelBased, 100, BatchMode::Concurrent)?;
//! harness.wait_idle().await;
//!
//! // The responder can start a probe too; its legs arrive on the bus.
//! responder.initiate("Message from the responder")?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{
    BatchProgress, Clock, HarnessConfig, LegTimings, ManualClock, MonotonicClock, PendingStats,
    ResponderConfig, RoundTripSample, SequenceTokenMinter, TokenMinter, TransportStatistics,
    UuidTokenMinter,
};
pub use error::{ConfigError, HarnessError, TransportError};
pub use ports::{EventSink, FramePayload, HarnessApi, ProbeTransport, TransportSignal};
pub use service::{FrameOutcome, LatencyHarness};
