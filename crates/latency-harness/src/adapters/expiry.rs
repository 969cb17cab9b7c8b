//! Background sweep for the optional probe timeout.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::service::LatencyHarness;

/// Periodically abandon probes older than the harness's probe timeout.
///
/// Returns immediately when no timeout is configured.
pub async fn expiry_task(harness: Arc<LatencyHarness>, mut shutdown: watch::Receiver<bool>) {
    if harness.config().probe_timeout.is_none() {
        return;
    }

    let mut sweep = tokio::time::interval(harness.config().sweep_interval);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sweep.tick() => {
                let expired = harness.sweep_expired();
                if expired > 0 {
                    debug!(expired, "Abandoned timed-out probes");
                }
            }
        }
    }
}
