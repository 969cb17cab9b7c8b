//! # Error Types
//!
//! Error categories shared between the harness and the event bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a recovered harness error, carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Send attempted on a transport that is not connected.
    TransportUnavailable,
    /// Response token had no pending entry.
    OrphanResponse,
    /// Minted token collided with a pending one.
    DuplicateToken,
    /// Batch start rejected because one is already running.
    BatchAlreadyRunning,
    /// Inbound message could not be decoded.
    MalformedPayload,
    /// Batch requested with fewer than one probe.
    InvalidTargetCount,
    /// Abort requested while idle.
    NoBatchRunning,
    /// Pending entry outlived the configured probe timeout.
    ProbeTimedOut,
}

impl ErrorKind {
    /// Stable snake_case label (metrics, logs).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransportUnavailable => "transport_unavailable",
            Self::OrphanResponse => "orphan_response",
            Self::DuplicateToken => "duplicate_token",
            Self::BatchAlreadyRunning => "batch_already_running",
            Self::MalformedPayload => "malformed_payload",
            Self::InvalidTargetCount => "invalid_target_count",
            Self::NoBatchRunning => "no_batch_running",
            Self::ProbeTimedOut => "probe_timed_out",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to parse a transport or mode tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTagError {
    #[error("Unknown transport: {0} (expected channel|socket)")]
    UnknownTransport(String),

    #[error("Unknown batch mode: {0} (expected sequential|concurrent)")]
    UnknownMode(String),
}
