//! # Runtime Configuration
//!
//! Unified configuration for the harness, both responders and the socket
//! endpoint.
//!
//! Defaults come first, then `LATENCY_*` environment overrides, then CLI
//! flags applied by `main`.

use latency_harness::{ConfigError, HarnessConfig, ResponderConfig};
use latency_types::TransportKind;
use serde::{Deserialize, Serialize};
use std::env;

/// Default WebSocket responder address.
pub const DEFAULT_WS_ADDR: &str = "127.0.0.1:3000";

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Address the in-process WebSocket responder binds to.
    pub ws_addr: String,
    /// Connect to this URL instead of `ws://{ws_addr}`.
    pub socket_url: Option<String>,
    /// Start the WebSocket responder in this process. The channel responder
    /// always runs in-process.
    pub spawn_responders: bool,
    /// Transports to wire up.
    pub transports: Vec<TransportKind>,
    /// Correlation engine configuration.
    pub harness: HarnessConfig,
    /// Responder configuration.
    pub responder: ResponderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ws_addr: DEFAULT_WS_ADDR.to_string(),
            socket_url: None,
            spawn_responders: true,
            transports: TransportKind::ALL.to_vec(),
            harness: HarnessConfig::default(),
            responder: ResponderConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `LATENCY_WS_ADDR`, `LATENCY_SOCKET_URL` and the
    /// harness and responder variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            harness: HarnessConfig::from_env()?,
            responder: ResponderConfig::from_env()?,
            ..Self::default()
        };

        if let Ok(addr) = env::var("LATENCY_WS_ADDR") {
            config.ws_addr = addr;
        }
        if let Ok(url) = env::var("LATENCY_SOCKET_URL") {
            config.socket_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transports.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "transports",
                reason: "at least one transport is required".into(),
            });
        }
        if self.ws_addr.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ws_addr",
                reason: "must not be empty".into(),
            });
        }
        if let Some(url) = &self.socket_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::InvalidValue {
                    field: "socket_url",
                    reason: format!("expected a ws:// or wss:// URL, got {url}"),
                });
            }
        }
        self.harness.validate()
    }

    pub fn uses(&self, transport: TransportKind) -> bool {
        self.transports.contains(&transport)
    }

    /// URL the socket transport connects to when no responder is spawned.
    pub fn socket_target(&self) -> String {
        self.socket_url
            .clone()
            .unwrap_or_else(|| format!("ws://{}", self.ws_addr))
    }
}
