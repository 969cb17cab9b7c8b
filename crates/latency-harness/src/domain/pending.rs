//! Pending-correlation table.
//!
//! Maps in-flight correlation tokens to their send time, partitioned by
//! transport. The two partitions never see each other's tokens, so a channel
//! echo carrying a socket token is an orphan.
//!
//! Flow:
//! 1. Probe mints a token and calls `register()` before dispatching
//! 2. The receipt loop calls `resolve()` with the echoed token
//! 3. `resolve()` removes the entry; a second call for the same token misses

use crate::error::HarnessError;
use latency_types::{CorrelationToken, Millis, TransportKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Who issued a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOrigin {
    /// Part of a running batch.
    Batch,
    /// Ad-hoc probe outside any batch.
    Single,
    /// Started by the responder.
    Reverse,
}

/// A probe waiting for its echo.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub token: CorrelationToken,
    pub transport: TransportKind,
    /// Send time on the issuing side's clock
    pub sent_at: Millis,
    /// Position within the batch (`None` for single probes)
    pub sequence_index: Option<usize>,
    pub origin: ProbeOrigin,
    /// Outbound message text
    pub message: String,
    /// When the far side acknowledged receipt, for probes that get one
    pub acknowledged_at: Option<Millis>,
}

/// Lifetime counters for the table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingStats {
    /// Entries registered
    pub registered: u64,
    /// Lookups that found and removed an entry
    pub resolved: u64,
    /// Lookups that found nothing
    pub orphaned: u64,
    /// Entries removed by `clear` or `evict`
    pub evicted: u64,
    /// Entries removed by `remove_expired`
    pub expired: u64,
}

/// In-flight probes keyed by token, one partition per transport.
#[derive(Debug, Default)]
pub struct PendingTable {
    partitions: HashMap<TransportKind, HashMap<CorrelationToken, PendingEntry>>,
    stats: PendingStats,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. An existing entry with the same token is kept and
    /// [`HarnessError::DuplicateToken`] is returned.
    pub fn register(&mut self, entry: PendingEntry) -> Result<(), HarnessError> {
        let partition = self.partitions.entry(entry.transport).or_default();
        if partition.contains_key(&entry.token) {
            warn!(
                transport = %entry.transport,
                token = %entry.token,
                "Refusing to overwrite pending entry"
            );
            return Err(HarnessError::DuplicateToken { token: entry.token });
        }

        debug!(
            transport = %entry.transport,
            token = %entry.token,
            sequence_index = ?entry.sequence_index,
            "Registered pending probe"
        );
        partition.insert(entry.token.clone(), entry);
        self.stats.registered += 1;
        Ok(())
    }

    /// Remove and return the entry for `token`. `None` means orphan.
    pub fn resolve(
        &mut self,
        transport: TransportKind,
        token: &CorrelationToken,
    ) -> Option<PendingEntry> {
        let entry = self
            .partitions
            .get_mut(&transport)
            .and_then(|partition| partition.remove(token));

        match entry {
            Some(entry) => {
                self.stats.resolved += 1;
                Some(entry)
            }
            None => {
                self.stats.orphaned += 1;
                None
            }
        }
    }

    /// Stamp the first acknowledgement for `token`. Returns whether the
    /// token is pending.
    pub fn acknowledge(
        &mut self,
        transport: TransportKind,
        token: &CorrelationToken,
        at: Millis,
    ) -> bool {
        let Some(entry) = self
            .partitions
            .get_mut(&transport)
            .and_then(|partition| partition.get_mut(token))
        else {
            return false;
        };
        entry.acknowledged_at.get_or_insert(at);
        true
    }

    /// Evict every entry, or only those of one transport.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self, transport: Option<TransportKind>) -> usize {
        let removed = match transport {
            Some(kind) => self
                .partitions
                .get_mut(&kind)
                .map(|partition| partition.drain().count())
                .unwrap_or(0),
            None => self
                .partitions
                .values_mut()
                .map(|partition| partition.drain().count())
                .sum(),
        };

        if removed > 0 {
            debug!(transport = ?transport, removed, "Cleared pending probes");
        }
        self.stats.evicted += removed as u64;
        removed
    }

    /// Remove one entry without counting it as resolved.
    pub fn evict(
        &mut self,
        transport: TransportKind,
        token: &CorrelationToken,
    ) -> Option<PendingEntry> {
        let entry = self
            .partitions
            .get_mut(&transport)
            .and_then(|partition| partition.remove(token))?;
        self.stats.evicted += 1;
        Some(entry)
    }

    /// Remove entries older than `ttl` at time `now`, oldest first.
    pub fn remove_expired(&mut self, now: Millis, ttl: Millis) -> Vec<PendingEntry> {
        let mut expired = Vec::new();

        for partition in self.partitions.values_mut() {
            partition.retain(|_, entry| {
                if now - entry.sent_at > ttl {
                    expired.push(entry.clone());
                    false
                } else {
                    true
                }
            });
        }

        expired.sort_by(|a, b| a.sent_at.total_cmp(&b.sent_at));
        self.stats.expired += expired.len() as u64;
        expired
    }

    /// Number of entries, in total or for one transport.
    pub fn pending_count(&self, transport: Option<TransportKind>) -> usize {
        match transport {
            Some(kind) => self.partitions.get(&kind).map_or(0, HashMap::len),
            None => self.partitions.values().map(HashMap::len).sum(),
        }
    }

    pub fn is_pending(&self, transport: TransportKind, token: &CorrelationToken) -> bool {
        self.partitions
            .get(&transport)
            .is_some_and(|partition| partition.contains_key(token))
    }

    pub fn stats(&self) -> PendingStats {
        self.stats
    }
}
