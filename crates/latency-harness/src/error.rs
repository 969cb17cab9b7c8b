//! Error types for the latency harness

use latency_types::{CorrelationToken, ErrorKind, Millis, TransportKind};
use thiserror::Error;

/// Errors returned by harness operations.
///
/// Every variant is also surfaced to the event sink as an error event, except
/// [`HarnessError::OrphanResponse`], which is reported as an orphan event.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{transport} transport is not available")]
    TransportUnavailable { transport: TransportKind },

    #[error("{transport} dispatch failed: {source}")]
    Dispatch {
        transport: TransportKind,
        #[source]
        source: TransportError,
    },

    #[error("Orphan {transport} response: {token}")]
    OrphanResponse {
        transport: TransportKind,
        token: CorrelationToken,
    },

    #[error("Duplicate correlation token: {token}")]
    DuplicateToken { token: CorrelationToken },

    #[error("A {running} batch is already running")]
    BatchAlreadyRunning { running: TransportKind },

    #[error("Malformed {transport} payload: {reason}")]
    MalformedPayload {
        transport: TransportKind,
        reason: String,
    },

    #[error("Invalid target count: {requested} (must be at least 1)")]
    InvalidTargetCount { requested: usize },

    #[error("No batch is running")]
    NoBatchRunning,

    #[error("{transport} probe {token} timed out after {waited_ms:.1} ms")]
    ProbeTimedOut {
        transport: TransportKind,
        token: CorrelationToken,
        waited_ms: Millis,
    },
}

impl HarnessError {
    /// Category carried by the matching error event.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportUnavailable { .. } | Self::Dispatch { .. } => {
                ErrorKind::TransportUnavailable
            }
            Self::OrphanResponse { .. } => ErrorKind::OrphanResponse,
            Self::DuplicateToken { .. } => ErrorKind::DuplicateToken,
            Self::BatchAlreadyRunning { .. } => ErrorKind::BatchAlreadyRunning,
            Self::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            Self::InvalidTargetCount { .. } => ErrorKind::InvalidTargetCount,
            Self::NoBatchRunning => ErrorKind::NoBatchRunning,
            Self::ProbeTimedOut { .. } => ErrorKind::ProbeTimedOut,
        }
    }

    /// Transport the error concerns, if any.
    #[must_use]
    pub fn transport(&self) -> Option<TransportKind> {
        match self {
            Self::TransportUnavailable { transport }
            | Self::Dispatch { transport, .. }
            | Self::OrphanResponse { transport, .. }
            | Self::MalformedPayload { transport, .. }
            | Self::ProbeTimedOut { transport, .. } => Some(*transport),
            Self::BatchAlreadyRunning { running } => Some(*running),
            Self::DuplicateToken { .. } | Self::InvalidTargetCount { .. } | Self::NoBatchRunning => {
                None
            }
        }
    }

    /// Token the error concerns, if any.
    #[must_use]
    pub fn token(&self) -> Option<&CorrelationToken> {
        match self {
            Self::OrphanResponse { token, .. }
            | Self::DuplicateToken { token }
            | Self::ProbeTimedOut { token, .. } => Some(token),
            _ => None,
        }
    }
}

/// Errors from transport adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Channel closed")]
    Closed,

    #[error("{0} cannot answer responder-started probes")]
    Unsupported(TransportKind),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid value in {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}
