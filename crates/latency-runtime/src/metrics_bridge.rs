//! Feeds harness events into the Prometheus collectors.

use latency_bus::{EventStream, HarnessEvent};
use latency_telemetry::metrics;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::debug;

/// Update the collectors for one event.
pub fn record_event(event: &HarnessEvent) {
    match event {
        HarnessEvent::RequestSent { transport, .. } => {
            metrics::record_probe_sent(transport.as_str());
        }
        HarnessEvent::ResponseReceived {
            transport,
            elapsed_ms,
            ..
        } => metrics::record_round_trip(transport.as_str(), *elapsed_ms),
        HarnessEvent::Orphan { transport, .. } => metrics::record_orphan(transport.as_str()),
        HarnessEvent::Error { kind, .. } => metrics::record_error(kind.as_str()),
        HarnessEvent::ReverseRoundTrip { .. }
        | HarnessEvent::BatchStarted { .. }
        | HarnessEvent::BatchFinished { .. }
        | HarnessEvent::TransportStatusChanged { .. } => {}
    }
}

/// Record every event from `events` until shutdown or until the bus goes
/// away.
pub async fn run_metrics_bridge(mut events: EventStream, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.next() => match event {
                Some(event) => record_event(&event),
                None => break,
            }
        }
    }
    debug!("Metrics bridge stopped");
}
