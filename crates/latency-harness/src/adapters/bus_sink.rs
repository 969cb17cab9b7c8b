//! Event sink backed by the in-memory event bus.

use latency_bus::{EventPublisher, HarnessEvent, InMemoryEventBus};
use tracing::trace;

use crate::ports::EventSink;

impl EventSink for InMemoryEventBus {
    fn emit(&self, event: HarnessEvent) {
        let receivers = self.publish(event);
        trace!(receivers, "Harness event emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latency_bus::EventFilter;
    use latency_types::TransportKind;

    #[test]
    fn test_emit_reaches_subscriber() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.emit(HarnessEvent::TransportStatusChanged {
            transport: TransportKind::ChannelBased,
            ready: true,
            at: 0.0,
            message: "IPC connected".into(),
        });

        assert!(sub.try_recv().unwrap().is_some());
        assert_eq!(bus.events_published(), 1);
    }
}
