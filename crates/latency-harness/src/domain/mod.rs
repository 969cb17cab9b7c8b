//! Domain Layer - Pure correlation and batch logic
//!
//! This layer contains:
//! - Token minting
//! - Pending-correlation table
//! - Batch run counters
//! - Statistics aggregation
//! - Leg timings for responder-started probes
//! - Clock abstraction
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod batch;
pub mod clock;
pub mod config;
pub mod legs;
pub mod pending;
pub mod statistics;
pub mod token;

pub use batch::{BatchProgress, BatchRun, BatchStep};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{HarnessConfig, ResponderConfig};
pub use legs::LegTimings;
pub use pending::{PendingEntry, PendingStats, PendingTable, ProbeOrigin};
pub use statistics::{RoundTripSample, StatisticsAggregator, TransportStatistics};
pub use token::{SequenceTokenMinter, TokenMinter, UuidTokenMinter};
