//! Structured message channel transport.
//!
//! Probes travel as `serde_json::Value` over an unbounded tokio channel; no
//! framing or text encoding is involved. The responding end is a
//! [`ChannelResponder`] that pushes echoes straight to the receipt loop.
//!
//! The responder can also start probes of its own through its
//! [`ChannelResponderHandle`]. Those arrive at the harness as frames, and the
//! harness answers them back down the same channel.

use latency_types::{CorrelationToken, ProbeRequest, ReverseReply, TransportKind};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapters::responder::echo_after;
use crate::domain::{ResponderConfig, TokenMinter, UuidTokenMinter};
use crate::error::TransportError;
use crate::ports::{EventSink, FramePayload, ProbeTransport, TransportSignal};
use crate::service::ReverseProbeTracker;

/// Token prefix for probes the responder starts.
const REVERSE_TOKEN_PREFIX: &str = "rev";

/// Sending half of the message channel.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<serde_json::Value>,
}

/// Receiving half, consumed by a responder.
pub struct ChannelEndpoint {
    inbound: mpsc::UnboundedReceiver<serde_json::Value>,
}

/// Create a connected transport/endpoint pair.
pub fn channel_link() -> (ChannelTransport, ChannelEndpoint) {
    let (outbound, inbound) = mpsc::unbounded_channel();
    (ChannelTransport { outbound }, ChannelEndpoint { inbound })
}

impl ProbeTransport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ChannelBased
    }

    fn is_ready(&self) -> bool {
        !self.outbound.is_closed()
    }

    fn dispatch(&self, request: &ProbeRequest) -> Result<(), TransportError> {
        let value =
            serde_json::to_value(request).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outbound
            .send(value)
            .map_err(|_| TransportError::Closed)
    }

    fn reply(&self, reply: &ReverseReply) -> Result<(), TransportError> {
        let value =
            serde_json::to_value(reply).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outbound
            .send(value)
            .map_err(|_| TransportError::Closed)
    }
}

/// Anything the harness sends down the channel.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponderInbound {
    Request(ProbeRequest),
    Reply(ReverseReply),
}

/// Echoes every probe arriving on a [`ChannelEndpoint`] and correlates the
/// answers to probes it started itself.
pub struct ChannelResponder {
    config: ResponderConfig,
    tracker: ReverseProbeTracker,
}

/// Running responder.
pub struct ChannelResponderHandle {
    commands: mpsc::UnboundedSender<(CorrelationToken, String)>,
    minter: UuidTokenMinter,
    task: JoinHandle<()>,
}

impl ChannelResponderHandle {
    /// Start a probe from the responder side.
    ///
    /// Returns the token its [`ReverseRoundTrip`](latency_bus::HarnessEvent::ReverseRoundTrip)
    /// event will carry.
    pub fn initiate(&self, message: &str) -> Result<CorrelationToken, TransportError> {
        let token = self.minter.mint(REVERSE_TOKEN_PREFIX);
        self.commands
            .send((token.clone(), message.to_string()))
            .map_err(|_| TransportError::Closed)?;
        Ok(token)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl ChannelResponder {
    /// Leg timings of responder-started probes go to `sink`.
    pub fn new(config: ResponderConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            tracker: ReverseProbeTracker::new(TransportKind::ChannelBased, sink),
        }
    }

    /// Run until the transport side is dropped.
    pub fn spawn(
        self,
        endpoint: ChannelEndpoint,
        signals: mpsc::UnboundedSender<TransportSignal>,
    ) -> ChannelResponderHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        ChannelResponderHandle {
            commands,
            minter: UuidTokenMinter::new(),
            task: tokio::spawn(self.run(endpoint, signals, commands_rx)),
        }
    }

    async fn run(
        mut self,
        mut endpoint: ChannelEndpoint,
        signals: mpsc::UnboundedSender<TransportSignal>,
        mut commands: mpsc::UnboundedReceiver<(CorrelationToken, String)>,
    ) {
        debug!(delay = ?self.config.processing_delay, "Channel responder started");

        loop {
            let value = tokio::select! {
                Some((token, message)) = commands.recv() => {
                    self.initiate(token, message, &signals);
                    continue;
                }
                value = endpoint.inbound.recv() => match value {
                    Some(value) => value,
                    None => break,
                },
            };

            let request = match serde_json::from_value(value) {
                Ok(ResponderInbound::Request(request)) => request,
                Ok(ResponderInbound::Reply(reply)) => {
                    // Orphans were already reported to the sink.
                    if let Err(e) = self.tracker.on_reply(&reply) {
                        debug!(error = %e, "Reply not correlated");
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Channel responder dropped undecodable frame");
                    continue;
                }
            };

            let delay = self.config.processing_delay;
            let signals = signals.clone();
            tokio::spawn(async move {
                let echo = echo_after(&request, delay).await;
                let payload = match serde_json::to_value(&echo) {
                    Ok(value) => FramePayload::Structured(value),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode echo");
                        return;
                    }
                };
                let _ = signals.send(TransportSignal::Frame {
                    transport: TransportKind::ChannelBased,
                    payload,
                });
            });
        }

        debug!("Channel responder stopped");
    }

    /// Register and send one responder-started probe.
    fn initiate(
        &mut self,
        token: CorrelationToken,
        message: String,
        signals: &mpsc::UnboundedSender<TransportSignal>,
    ) {
        let probe = match self.tracker.begin(token.clone(), message) {
            Ok(probe) => probe,
            Err(e) => {
                warn!(token = %token, error = %e, "Responder probe not started");
                return;
            }
        };

        let sent = serde_json::to_value(&probe)
            .map_err(|e| TransportError::Encode(e.to_string()))
            .and_then(|value| {
                signals
                    .send(TransportSignal::Frame {
                        transport: TransportKind::ChannelBased,
                        payload: FramePayload::Structured(value),
                    })
                    .map_err(|_| TransportError::Closed)
            });

        match sent {
            Ok(()) => debug!(token = %token, "Responder probe sent"),
            Err(e) => {
                warn!(token = %token, error = %e, "Responder probe send failed");
                self.tracker.cancel(&token);
            }
        }
    }
}
