//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to log lines
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to register the Prometheus collectors
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "latency-harness".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LATENCY_SERVICE_NAME`: Service name (default: latency-harness)
    /// - `LATENCY_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `LATENCY_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `LATENCY_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `LATENCY_METRICS`: Register Prometheus collectors (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: env::var("LATENCY_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("LATENCY_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: env::var("LATENCY_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.console_output),

            json_logs: env::var("LATENCY_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.json_logs),

            metrics_enabled: env::var("LATENCY_METRICS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Override the log level, e.g. from a `--verbose` flag.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
