//! Inbound Ports (Driving Ports)
//!
//! The API presentation code drives. Event subscription is not here: callers
//! subscribe to the bus the harness emits into.

use async_trait::async_trait;
use latency_types::{BatchMode, CorrelationToken, TransportKind};

use crate::domain::{BatchProgress, TransportStatistics};
use crate::error::HarnessError;

/// Primary harness API (Driving Port)
#[async_trait]
pub trait HarnessApi: Send + Sync {
    /// Start a batch of `target_count` probes on `transport`.
    ///
    /// Fails with `InvalidTargetCount`, `BatchAlreadyRunning` or
    /// `TransportUnavailable`; a running batch is never affected.
    fn start_batch(
        &self,
        transport: TransportKind,
        target_count: usize,
        mode: BatchMode,
    ) -> Result<(), HarnessError>;

    /// Force the running batch back to idle. Its in-flight probes are
    /// dropped and their late echoes become orphans.
    fn abort_batch(&self) -> Result<BatchProgress, HarnessError>;

    /// Send one probe outside any batch.
    fn send_single(
        &self,
        transport: TransportKind,
        message: &str,
    ) -> Result<CorrelationToken, HarnessError>;

    /// Per-transport statistics in order of first sample.
    fn statistics(&self) -> Vec<TransportStatistics>;

    fn reset_statistics(&self);

    /// Progress of the running batch, if any.
    fn batch_status(&self) -> Option<BatchProgress>;

    /// Resolve once no batch is running.
    async fn wait_idle(&self);
}
