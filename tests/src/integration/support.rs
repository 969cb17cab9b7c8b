//! Shared fixtures: a scripted transport and a harness wired to a real bus.

use latency_bus::{EventFilter, HarnessEvent, InMemoryEventBus, Subscription};
use latency_harness::{
    HarnessConfig, LatencyHarness, ManualClock, ProbeTransport, SequenceTokenMinter, TokenMinter,
    TransportError,
};
use latency_types::{CorrelationToken, ErrorKind, ProbeEcho, ProbeRequest, TransportKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Transport that records every request and never answers on its own.
pub struct ScriptedTransport {
    kind: TransportKind,
    ready: AtomicBool,
    sent: Mutex<Vec<ProbeRequest>>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            ready: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Requests dispatched since the last call.
    pub fn take(&self) -> Vec<ProbeRequest> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl ProbeTransport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn dispatch(&self, request: &ProbeRequest) -> Result<(), TransportError> {
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

pub struct Fixture {
    pub harness: LatencyHarness,
    pub clock: Arc<ManualClock>,
    pub channel: Arc<ScriptedTransport>,
    pub socket: Arc<ScriptedTransport>,
    pub events: Subscription,
    _bus: Arc<InMemoryEventBus>,
}

/// Minter that hands out the same token every time.
pub struct ConstantMinter(pub &'static str);

impl TokenMinter for ConstantMinter {
    fn mint(&self, _prefix: &str) -> CorrelationToken {
        CorrelationToken::from(self.0)
    }
}

impl Fixture {
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_minter(config, Arc::new(SequenceTokenMinter::new()))
    }

    pub fn with_minter(config: HarnessConfig, minter: Arc<dyn TokenMinter>) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe(EventFilter::all());
        let clock = Arc::new(ManualClock::new(0.0));
        let channel = ScriptedTransport::new(TransportKind::ChannelBased);
        let socket = ScriptedTransport::new(TransportKind::SocketBased);

        let harness = LatencyHarness::new(config, bus.clone())
            .with_clock(clock.clone())
            .with_minter(minter);
        harness.attach_transport(channel.clone());
        harness.attach_transport(socket.clone());

        Self {
            harness,
            clock,
            channel,
            socket,
            events,
            _bus: bus,
        }
    }

    /// Every event published so far.
    pub fn drain(&mut self) -> Vec<HarnessEvent> {
        self.events.drain()
    }
}

pub fn echo(request: &ProbeRequest) -> ProbeEcho {
    ProbeEcho::reply_to(request, None)
}

/// Kinds of every `Error` event, in order.
pub fn error_kinds(events: &[HarnessEvent]) -> Vec<ErrorKind> {
    events
        .iter()
        .filter_map(|event| match event {
            HarnessEvent::Error { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

pub fn orphan_count(events: &[HarnessEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, HarnessEvent::Orphan { .. }))
        .count()
}

/// `(completed, abandoned, aborted)` of the first `BatchFinished` event.
pub fn finished(events: &[HarnessEvent]) -> Option<(usize, usize, bool)> {
    events.iter().find_map(|event| match event {
        HarnessEvent::BatchFinished {
            completed_count,
            abandoned_count,
            aborted,
            ..
        } => Some((*completed_count, *abandoned_count, *aborted)),
        _ => None,
    })
}
