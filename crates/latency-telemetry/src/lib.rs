//! # Latency Telemetry
//!
//! Logging and metrics for the IPC latency harness.
//!
//! ## Components
//!
//! - Structured logs via `tracing-subscriber` (pretty or JSON)
//! - Prometheus counters and a round-trip histogram
//!
//! ## Usage
//!
//! ```rust,ignore
//! use latency_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LATENCY_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `LATENCY_JSON_LOGS` | `false` | JSON log lines |
//! | `LATENCY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `LATENCY_METRICS` | `true` | Register Prometheus collectors |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, HARNESS_ERRORS, ORPHAN_RESPONSES,
    PROBES_SENT, RESPONSES_MATCHED, ROUND_TRIP_MS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    /// Whether Prometheus collectors were registered.
    #[must_use]
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_error_display() {
        let err = TelemetryError::MetricsInit("duplicate".into());
        assert_eq!(
            err.to_string(),
            "Failed to initialize Prometheus metrics: duplicate"
        );
    }
}
