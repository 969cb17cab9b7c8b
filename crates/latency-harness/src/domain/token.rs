//! Correlation token minting.

use latency_types::CorrelationToken;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Mints opaque correlation tokens.
///
/// Tokens must be unique among all pending tokens for the process lifetime.
pub trait TokenMinter: Send + Sync {
    /// Mint a new token carrying `prefix`.
    fn mint(&self, prefix: &str) -> CorrelationToken;
}

/// Default minter: `<prefix>-<uuid v7>`.
///
/// UUID v7 is time-ordered, so tokens sort by mint time in logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokenMinter;

impl UuidTokenMinter {
    pub fn new() -> Self {
        Self
    }
}

impl TokenMinter for UuidTokenMinter {
    fn mint(&self, prefix: &str) -> CorrelationToken {
        CorrelationToken::new(format!("{prefix}-{}", Uuid::now_v7().simple()))
    }
}

/// Deterministic minter producing `<prefix>-1`, `<prefix>-2`, ...
///
/// The counter is shared across prefixes.
#[derive(Debug, Default)]
pub struct SequenceTokenMinter {
    next: AtomicU64,
}

impl SequenceTokenMinter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenMinter for SequenceTokenMinter {
    fn mint(&self, prefix: &str) -> CorrelationToken {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        CorrelationToken::new(format!("{prefix}-{n}"))
    }
}
