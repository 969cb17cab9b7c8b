//! # IPC Latency Harness Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs   # Correlation and batch scenarios on scripted transports
//!     └── transports.rs  # End-to-end runs over the real channel and WebSocket
//! tests/benches/
//! └── correlation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p latency-tests
//! cargo test -p latency-tests integration::scenarios::
//! cargo bench -p latency-tests
//! ```

pub mod integration;
