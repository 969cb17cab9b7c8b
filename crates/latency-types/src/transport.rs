//! # Transport Tags
//!
//! Identifies which mechanism a probe travels over and how a batch issues
//! its probes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ParseTagError;

/// The two transports under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportKind {
    /// Structured message channel (typed values, no framing).
    #[serde(rename = "channel")]
    ChannelBased,
    /// WebSocket channel (JSON text frames over TCP).
    #[serde(rename = "socket")]
    SocketBased,
}

impl TransportKind {
    /// Both transports, in presentation order.
    pub const ALL: [TransportKind; 2] = [TransportKind::ChannelBased, TransportKind::SocketBased];

    /// Prefix used when minting correlation tokens for this transport.
    #[must_use]
    pub fn token_prefix(self) -> &'static str {
        match self {
            Self::ChannelBased => "ipc",
            Self::SocketBased => "ws",
        }
    }

    /// Stable lowercase label (metrics, logs).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChannelBased => "channel",
            Self::SocketBased => "socket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelBased => write!(f, "IPC"),
            Self::SocketBased => write!(f, "WebSocket"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "channel" | "ipc" => Ok(Self::ChannelBased),
            "socket" | "ws" | "websocket" => Ok(Self::SocketBased),
            other => Err(ParseTagError::UnknownTransport(other.to_string())),
        }
    }
}

/// How a batch keeps probes in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// One probe in flight; the next is sent when it resolves.
    Sequential,
    /// Every probe is sent up front and resolved in any order.
    Concurrent,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl FromStr for BatchMode {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(Self::Sequential),
            "concurrent" | "conc" => Ok(Self::Concurrent),
            other => Err(ParseTagError::UnknownMode(other.to_string())),
        }
    }
}
