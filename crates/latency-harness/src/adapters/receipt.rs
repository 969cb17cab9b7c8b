//! Receipt loop: the single consumer of everything transports push back.
//!
//! Every inbound frame and status change for both transports funnels
//! through one `mpsc` receiver, so the harness sees them strictly one at a
//! time in arrival order.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::ports::TransportSignal;
use crate::service::LatencyHarness;

/// Drain `signals` into `harness` until shutdown or until every sender is
/// gone.
pub async fn run_receipt_loop(
    harness: Arc<LatencyHarness>,
    mut signals: mpsc::UnboundedReceiver<TransportSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Receipt loop started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            signal = signals.recv() => match signal {
                Some(TransportSignal::Frame { transport, payload }) => {
                    // Errors were already reported to the sink.
                    if let Err(e) = harness.on_frame(transport, payload) {
                        debug!(transport = %transport, error = %e, "Frame not correlated");
                    }
                }
                Some(TransportSignal::Status { transport, ready }) => {
                    harness.on_transport_status(transport, ready);
                }
                None => break,
            }
        }
    }

    info!("Receipt loop stopped");
}
