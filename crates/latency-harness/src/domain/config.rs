//! Harness and responder configuration.
//!
//! # Example
//!
//! ```ignore
//! use latency_harness::domain::HarnessConfig;
//! use std::time::Duration;
//!
//! let config = HarnessConfig {
//!     probe_timeout: Some(Duration::from_secs(2)),
//!     ..HarnessConfig::default()
//! };
//! config.validate()?;
//! ```

use crate::error::ConfigError;
use latency_types::TransportKind;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Correlation engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Give up on a probe after this long. `None` keeps probes pending until
    /// answered or aborted.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Option<Duration>,
    /// How often the expiry task sweeps for timed-out probes
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Text prefix for batch probe messages
    pub message_prefix: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            probe_timeout: None,
            sweep_interval: Duration::from_millis(100),
            message_prefix: "Test message".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by `LATENCY_PROBE_TIMEOUT_MS` (0 disables).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = env_millis("LATENCY_PROBE_TIMEOUT_MS")? {
            config.probe_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval",
                reason: "must be greater than zero".into(),
            });
        }
        if self.probe_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidValue {
                field: "probe_timeout",
                reason: "use None to disable the timeout".into(),
            });
        }
        Ok(())
    }

    /// Message text for the batch probe at `sequence_index`.
    pub fn batch_message(&self, transport: TransportKind, sequence_index: usize) -> String {
        format!(
            "{} #{} via {}",
            self.message_prefix,
            sequence_index + 1,
            transport
        )
    }
}

/// Responding side configuration, shared by both responders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Fixed delay before each echo
    #[serde(with = "humantime_serde")]
    pub processing_delay: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(5),
        }
    }
}

impl ResponderConfig {
    /// No delay at all.
    pub fn immediate() -> Self {
        Self {
            processing_delay: Duration::ZERO,
        }
    }

    /// Defaults overridden by `LATENCY_PROCESSING_DELAY_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = env_millis("LATENCY_PROCESSING_DELAY_MS")? {
            config.processing_delay = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

fn env_millis(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}
