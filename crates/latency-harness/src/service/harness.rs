//! Latency Harness Service
//!
//! Owns the pending table, the active batch and the statistics behind one
//! mutex. Every caller operation and every inbound frame takes that lock, and
//! every event is emitted while it is held, so the sink observes operations in
//! the order they took effect.

use async_trait::async_trait;
use latency_bus::HarnessEvent;
use latency_types::{
    BatchMode, CorrelationToken, InboundFrame, Millis, ProbeEcho, ReverseProbe, ReverseReply,
    TransportKind,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{
    BatchProgress, BatchRun, BatchStep, Clock, HarnessConfig, MonotonicClock, PendingEntry,
    PendingStats, PendingTable, ProbeOrigin, RoundTripSample, StatisticsAggregator, TokenMinter,
    TransportStatistics, UuidTokenMinter,
};
use crate::error::HarnessError;
use crate::ports::{EventSink, FramePayload, HarnessApi, ProbeTransport};
use crate::service::probe::{ResponseOutcome, TransportProbe};

/// Mutable engine state. Only ever touched under [`LatencyHarness::state`].
#[derive(Default)]
struct HarnessState {
    pending: PendingTable,
    batch: Option<BatchRun>,
    statistics: StatisticsAggregator,
}

/// What an inbound frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Echo of one of our probes
    Matched(RoundTripSample),
    /// Probe started by the responder, already answered
    Answered(CorrelationToken),
}

impl FrameOutcome {
    pub fn sample(self) -> Option<RoundTripSample> {
        match self {
            Self::Matched(sample) => Some(sample),
            Self::Answered(_) => None,
        }
    }
}

/// Correlation and batch-orchestration engine.
///
/// Implements [`HarnessApi`] for presentation code; transports feed it through
/// [`on_frame`](Self::on_frame) and [`on_transport_status`](Self::on_transport_status),
/// normally via the receipt loop.
pub struct LatencyHarness {
    state: Mutex<HarnessState>,
    probes: RwLock<HashMap<TransportKind, TransportProbe>>,
    minter: Arc<dyn TokenMinter>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    /// `true` while no batch is running
    idle: watch::Sender<bool>,
    config: HarnessConfig,
}

impl LatencyHarness {
    pub fn new(config: HarnessConfig, sink: Arc<dyn EventSink>) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            state: Mutex::new(HarnessState::default()),
            probes: RwLock::new(HashMap::new()),
            minter: Arc::new(UuidTokenMinter::new()),
            clock: Arc::new(MonotonicClock::new()),
            sink,
            idle,
            config,
        }
    }

    /// Replace the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the token minter.
    #[must_use]
    pub fn with_minter(mut self, minter: Arc<dyn TokenMinter>) -> Self {
        self.minter = minter;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Register the sending half of a transport, replacing any previous one
    /// of the same kind.
    pub fn attach_transport(&self, transport: Arc<dyn ProbeTransport>) {
        let kind = transport.kind();
        self.probes
            .write()
            .insert(kind, TransportProbe::new(transport));
        debug!(transport = %kind, "Transport attached");
    }

    pub fn is_transport_ready(&self, kind: TransportKind) -> bool {
        self.probe(kind).is_some_and(|probe| probe.is_ready())
    }

    pub fn pending_count(&self, transport: Option<TransportKind>) -> usize {
        self.state.lock().pending.pending_count(transport)
    }

    pub fn pending_stats(&self) -> PendingStats {
        self.state.lock().pending.stats()
    }

    /// Decode an inbound frame and correlate or answer it.
    ///
    /// The receive time is taken before decoding, so decode cost is part of
    /// the measured round trip just as it would be for any consumer.
    pub fn on_frame(
        &self,
        transport: TransportKind,
        payload: FramePayload,
    ) -> Result<FrameOutcome, HarnessError> {
        let received_at = self.clock.now_millis();

        let decoded = match payload {
            FramePayload::Structured(value) => serde_json::from_value::<InboundFrame>(value),
            FramePayload::Encoded(text) => serde_json::from_str::<InboundFrame>(&text),
        };

        match decoded {
            Ok(InboundFrame::Echo(echo)) => self
                .on_response(transport, &echo, received_at)
                .map(FrameOutcome::Matched),
            Ok(InboundFrame::Reverse(probe)) => self
                .on_reverse_probe(transport, &probe, received_at)
                .map(|()| FrameOutcome::Answered(probe.probe_id)),
            Err(e) => {
                let _state = self.state.lock();
                Err(self.reject(HarnessError::MalformedPayload {
                    transport,
                    reason: e.to_string(),
                }))
            }
        }
    }

    /// Correlate a decoded echo received at `received_at`.
    pub fn on_response(
        &self,
        transport: TransportKind,
        echo: &ProbeEcho,
        received_at: Millis,
    ) -> Result<RoundTripSample, HarnessError> {
        let mut state = self.state.lock();

        match TransportProbe::on_response(&mut state.pending, transport, echo, received_at) {
            ResponseOutcome::Orphan => {
                warn!(
                    transport = %transport,
                    token = %echo.token,
                    "Response for unknown or finished probe"
                );
                self.sink.emit(HarnessEvent::Orphan {
                    transport,
                    token: echo.token.clone(),
                    received_at,
                    message: format!("No pending {transport} probe for token {}", echo.token),
                });
                Err(HarnessError::OrphanResponse {
                    transport,
                    token: echo.token.clone(),
                })
            }
            ResponseOutcome::Matched { entry, sample } => {
                state.statistics.record(&sample);

                debug!(
                    transport = %transport,
                    token = %entry.token,
                    elapsed_ms = sample.elapsed_ms,
                    "Matched response"
                );
                self.sink.emit(HarnessEvent::ResponseReceived {
                    transport,
                    token: entry.token.clone(),
                    sequence_index: entry.sequence_index,
                    sent_at: entry.sent_at,
                    received_at,
                    elapsed_ms: sample.elapsed_ms,
                    processing_ms: echo.processing_ms,
                    message: format!("Received response via {transport}"),
                });

                let step = state
                    .batch
                    .as_mut()
                    .filter(|run| run.transport() == transport)
                    .and_then(|run| run.record_resolved(&entry.token));
                if let Some(step) = step {
                    self.advance(&mut state, step);
                }

                Ok(sample)
            }
        }
    }

    /// Answer a probe the responder started at `received_at`.
    ///
    /// The acknowledgement goes out first, then the response carrying how
    /// long the probe spent on this side. Nothing is registered here; the
    /// responder does its own correlation.
    pub fn on_reverse_probe(
        &self,
        transport: TransportKind,
        probe: &ReverseProbe,
        received_at: Millis,
    ) -> Result<(), HarnessError> {
        let Some(port) = self.probe(transport) else {
            let _state = self.state.lock();
            return Err(self.reject(HarnessError::TransportUnavailable { transport }));
        };

        debug!(transport = %transport, token = %probe.probe_id, "Answering responder probe");
        let answered = port
            .reply(&ReverseReply::Received {
                probe_id: probe.probe_id.clone(),
            })
            .and_then(|()| {
                port.reply(&ReverseReply::Response {
                    probe_id: probe.probe_id.clone(),
                    response_ms: (self.clock.now_millis() - received_at).max(0.0),
                })
            });

        answered.map_err(|err| {
            let _state = self.state.lock();
            self.reject(err)
        })
    }

    /// Report a transport connecting or disconnecting.
    pub fn on_transport_status(&self, transport: TransportKind, ready: bool) {
        let state = self.state.lock();

        if ready {
            info!(transport = %transport, "Transport ready");
        } else {
            warn!(transport = %transport, "Transport unavailable");
            if let Some(run) = state.batch.as_ref().filter(|run| run.transport() == transport) {
                warn!(
                    transport = %transport,
                    active = run.active(),
                    "Batch transport went away; in-flight probes wait for timeout or abort"
                );
            }
        }

        self.sink.emit(HarnessEvent::TransportStatusChanged {
            transport,
            ready,
            at: self.clock.now_millis(),
            message: if ready {
                format!("{transport} connected")
            } else {
                format!("{transport} disconnected")
            },
        });
    }

    /// Abandon probes older than the configured timeout.
    ///
    /// Returns the number abandoned. Does nothing without a timeout.
    pub fn sweep_expired(&self) -> usize {
        let Some(timeout) = self.config.probe_timeout else {
            return 0;
        };
        let ttl = timeout.as_secs_f64() * 1000.0;
        let now = self.clock.now_millis();

        let mut state = self.state.lock();
        let expired = state.pending.remove_expired(now, ttl);

        for entry in &expired {
            let err = HarnessError::ProbeTimedOut {
                transport: entry.transport,
                token: entry.token.clone(),
                waited_ms: now - entry.sent_at,
            };
            warn!(transport = %entry.transport, token = %entry.token, "Probe timed out");
            self.sink.emit(self.error_event(&err));

            let step = state
                .batch
                .as_mut()
                .filter(|run| run.transport() == entry.transport)
                .and_then(|run| run.record_abandoned(&entry.token));
            if let Some(step) = step {
                self.advance(&mut state, step);
            }
        }

        expired.len()
    }

    fn probe(&self, kind: TransportKind) -> Option<TransportProbe> {
        self.probes.read().get(&kind).cloned()
    }

    fn advance(&self, state: &mut HarnessState, step: BatchStep) {
        match step {
            BatchStep::Finished => {
                self.finish_batch(state, false);
            }
            BatchStep::SendNext => self.issue_batch_probe(state),
            BatchStep::Await => {}
        }
    }

    /// Send the next probe of the running batch.
    ///
    /// A failed send is reported and not retried; the batch keeps whatever
    /// is already in flight.
    fn issue_batch_probe(&self, state: &mut HarnessState) {
        let HarnessState { pending, batch, .. } = state;
        let Some(run) = batch.as_mut() else {
            return;
        };

        let transport = run.transport();
        let index = run.next_sequence_index();
        let message = self.config.batch_message(transport, index);

        let sent = match self.probe(transport) {
            Some(probe) => probe.send(
                pending,
                self.minter.as_ref(),
                self.clock.as_ref(),
                Some(index),
                ProbeOrigin::Batch,
                message,
            ),
            None => Err(HarnessError::TransportUnavailable { transport }),
        };

        match sent {
            Ok(entry) => {
                run.record_sent(entry.token.clone());
                self.emit_sent(&entry);
            }
            Err(err) => {
                warn!(
                    transport = %transport,
                    sequence_index = index,
                    error = %err,
                    "Batch probe send failed"
                );
                self.sink.emit(self.error_event(&err));
            }
        }
    }

    fn finish_batch(&self, state: &mut HarnessState, aborted: bool) -> Option<BatchProgress> {
        let run = state.batch.take()?;
        let progress = run.progress();

        info!(
            transport = %progress.transport,
            mode = %progress.mode,
            completed = progress.completed_count,
            abandoned = progress.abandoned_count,
            aborted,
            "Batch finished"
        );
        self.sink.emit(HarnessEvent::BatchFinished {
            transport: progress.transport,
            mode: progress.mode,
            target_count: progress.target_count,
            completed_count: progress.completed_count,
            abandoned_count: progress.abandoned_count,
            aborted,
            finished_at: self.clock.now_millis(),
            message: if aborted {
                format!(
                    "Batch test aborted: {}/{} completed",
                    progress.completed_count, progress.target_count
                )
            } else {
                format!("Batch test completed: {} iterations", progress.target_count)
            },
        });

        self.idle.send_replace(true);
        Some(progress)
    }

    fn emit_sent(&self, entry: &PendingEntry) {
        let message = match entry.origin {
            ProbeOrigin::Batch => format!("Sent batch probe via {}", entry.transport),
            ProbeOrigin::Single | ProbeOrigin::Reverse => {
                format!("Sent probe via {}", entry.transport)
            }
        };
        self.sink.emit(HarnessEvent::RequestSent {
            transport: entry.transport,
            token: entry.token.clone(),
            sequence_index: entry.sequence_index,
            sent_at: entry.sent_at,
            message,
        });
    }

    fn error_event(&self, err: &HarnessError) -> HarnessEvent {
        HarnessEvent::Error {
            transport: err.transport(),
            token: err.token().cloned(),
            kind: err.kind(),
            at: self.clock.now_millis(),
            message: err.to_string(),
        }
    }

    /// Report a rejected operation and hand the error back.
    fn reject(&self, err: HarnessError) -> HarnessError {
        warn!(kind = %err.kind(), error = %err, "Operation rejected");
        self.sink.emit(self.error_event(&err));
        err
    }
}

#[async_trait]
impl HarnessApi for LatencyHarness {
    fn start_batch(
        &self,
        transport: TransportKind,
        target_count: usize,
        mode: BatchMode,
    ) -> Result<(), HarnessError> {
        let probe = self.probe(transport);
        let mut state = self.state.lock();

        if target_count < 1 {
            return Err(self.reject(HarnessError::InvalidTargetCount {
                requested: target_count,
            }));
        }
        if let Some(run) = &state.batch {
            return Err(self.reject(HarnessError::BatchAlreadyRunning {
                running: run.transport(),
            }));
        }
        if !probe.is_some_and(|probe| probe.is_ready()) {
            return Err(self.reject(HarnessError::TransportUnavailable { transport }));
        }

        let stale = state.pending.clear(Some(transport));
        if stale > 0 {
            debug!(transport = %transport, stale, "Dropped stale probes before batch");
        }

        let started_at = self.clock.now_millis();
        let run = BatchRun::new(transport, target_count, mode, started_at);
        let initial_sends = run.initial_sends();
        state.batch = Some(run);
        self.idle.send_replace(false);

        info!(transport = %transport, mode = %mode, target_count, "Batch started");
        self.sink.emit(HarnessEvent::BatchStarted {
            transport,
            mode,
            target_count,
            started_at,
            message: format!("Starting batch test: {target_count} iterations, {mode} via {transport}"),
        });

        for _ in 0..initial_sends {
            self.issue_batch_probe(&mut state);
        }
        Ok(())
    }

    fn abort_batch(&self) -> Result<BatchProgress, HarnessError> {
        let mut state = self.state.lock();

        let Some(transport) = state.batch.as_ref().map(BatchRun::transport) else {
            return Err(self.reject(HarnessError::NoBatchRunning));
        };

        let dropped = state.pending.clear(Some(transport));
        debug!(transport = %transport, dropped, "Aborting batch");

        self.finish_batch(&mut state, true)
            .ok_or(HarnessError::NoBatchRunning)
    }

    fn send_single(
        &self,
        transport: TransportKind,
        message: &str,
    ) -> Result<CorrelationToken, HarnessError> {
        let probe = self.probe(transport);
        let mut state = self.state.lock();

        if state
            .batch
            .as_ref()
            .is_some_and(|run| run.transport() == transport)
        {
            return Err(self.reject(HarnessError::BatchAlreadyRunning { running: transport }));
        }
        let Some(probe) = probe else {
            return Err(self.reject(HarnessError::TransportUnavailable { transport }));
        };

        match probe.send(
            &mut state.pending,
            self.minter.as_ref(),
            self.clock.as_ref(),
            None,
            ProbeOrigin::Single,
            message.to_string(),
        ) {
            Ok(entry) => {
                self.emit_sent(&entry);
                Ok(entry.token)
            }
            Err(err) => Err(self.reject(err)),
        }
    }

    fn statistics(&self) -> Vec<TransportStatistics> {
        self.state.lock().statistics.snapshot()
    }

    fn reset_statistics(&self) {
        self.state.lock().statistics.reset();
        debug!("Statistics reset");
    }

    fn batch_status(&self) -> Option<BatchProgress> {
        self.state.lock().batch.as_ref().map(BatchRun::progress)
    }

    async fn wait_idle(&self) {
        let mut idle = self.idle.subscribe();
        // The sender lives as long as `self`, so this only fails on teardown.
        let _ = idle.wait_for(|idle| *idle).await;
    }
}
