//! Per-transport round-trip statistics.

use latency_types::{Millis, TransportKind};
use serde::{Deserialize, Serialize};

/// One measured round trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundTripSample {
    pub transport: TransportKind,
    pub elapsed_ms: Millis,
}

impl RoundTripSample {
    /// Sample from a send and receive timestamp on the same clock.
    ///
    /// A receive stamped before its send (clock adjustment in a custom
    /// [`Clock`](crate::domain::Clock)) counts as zero.
    pub fn between(transport: TransportKind, sent_at: Millis, received_at: Millis) -> Self {
        Self {
            transport,
            elapsed_ms: (received_at - sent_at).max(0.0),
        }
    }
}

/// Running aggregate for one transport.
///
/// `avg_ms` is `total_ms / count`, pinned into `[min_ms, max_ms]` so float
/// rounding never reports an average outside the observed range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStatistics {
    pub transport: TransportKind,
    pub count: u64,
    pub min_ms: Millis,
    pub max_ms: Millis,
    pub total_ms: Millis,
    pub avg_ms: Millis,
}

impl TransportStatistics {
    fn first(sample: &RoundTripSample) -> Self {
        Self {
            transport: sample.transport,
            count: 1,
            min_ms: sample.elapsed_ms,
            max_ms: sample.elapsed_ms,
            total_ms: sample.elapsed_ms,
            avg_ms: sample.elapsed_ms,
        }
    }

    fn add(&mut self, elapsed_ms: Millis) {
        self.count += 1;
        self.total_ms += elapsed_ms;
        self.min_ms = self.min_ms.min(elapsed_ms);
        self.max_ms = self.max_ms.max(elapsed_ms);
        self.avg_ms = (self.total_ms / self.count as f64).clamp(self.min_ms, self.max_ms);
    }
}

/// Statistics for every transport that has produced a sample, in order of
/// first sample. Survives across batches until [`reset`](Self::reset).
#[derive(Debug, Default, Clone)]
pub struct StatisticsAggregator {
    entries: Vec<TransportStatistics>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: &RoundTripSample) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.transport == sample.transport)
        {
            Some(entry) => entry.add(sample.elapsed_ms),
            None => self.entries.push(TransportStatistics::first(sample)),
        }
    }

    pub fn snapshot(&self) -> Vec<TransportStatistics> {
        self.entries.clone()
    }

    pub fn get(&self, transport: TransportKind) -> Option<&TransportStatistics> {
        self.entries.iter().find(|entry| entry.transport == transport)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
