//! # IPC Latency Runtime
//!
//! Wires the correlation engine to both transports and drives it.
//!
//! ## Startup Sequence
//!
//! 1. Create the event bus and the harness
//! 2. Spawn the receipt loop, the expiry task and the metrics bridge
//! 3. Link the message channel and spawn its responder
//! 4. Bind the WebSocket responder (unless connecting to an external one)
//!    and connect the socket transport
//!
//! Batches then run one at a time through [`LatencyRuntime::run_batch`].
//! The channel responder can also start a probe of its own through
//! [`LatencyRuntime::reverse_probe`].

pub mod config;
pub mod metrics_bridge;
pub mod report;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use latency_bus::{EventFilter, EventTopic, HarnessEvent, InMemoryEventBus};
use latency_harness::adapters::{
    channel_link, expiry_task, run_receipt_loop, ChannelResponder, ChannelResponderHandle,
    SocketServerToggle, SocketTransport,
};
use latency_harness::{HarnessApi, LatencyHarness, LegTimings, TransportSignal};
use latency_types::{BatchMode, Millis, TransportKind};

pub use crate::config::RuntimeConfig;
pub use crate::report::BatchOutcome;

/// The running harness with its transports and background tasks.
pub struct LatencyRuntime {
    config: RuntimeConfig,
    bus: Arc<InMemoryEventBus>,
    harness: Arc<LatencyHarness>,
    /// Kept for reconnecting the socket transport.
    signals: mpsc::UnboundedSender<TransportSignal>,
    socket_server: Option<SocketServerToggle>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    channel_responder: Option<ChannelResponderHandle>,
}

/// How long a stopped responder may take to show up as a disconnect.
const DISCONNECT_WAIT: Duration = Duration::from_secs(5);

impl LatencyRuntime {
    /// Build and wire everything `config` asks for.
    pub async fn start(config: RuntimeConfig) -> Result<Self> {
        config.validate().context("Invalid runtime configuration")?;

        let bus = Arc::new(InMemoryEventBus::new());
        let harness = Arc::new(LatencyHarness::new(config.harness.clone(), bus.clone()));
        let (signals, signals_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(run_receipt_loop(
                harness.clone(),
                signals_rx,
                shutdown_rx.clone(),
            )),
            tokio::spawn(expiry_task(harness.clone(), shutdown_rx.clone())),
            tokio::spawn(metrics_bridge::run_metrics_bridge(
                bus.event_stream(EventFilter::all()),
                shutdown_rx,
            )),
        ];

        let mut runtime = Self {
            config,
            bus,
            harness,
            signals,
            socket_server: None,
            shutdown_tx,
            tasks,
            channel_responder: None,
        };

        if runtime.config.uses(TransportKind::ChannelBased) {
            runtime.start_channel();
        }
        if runtime.config.uses(TransportKind::SocketBased) {
            if runtime.config.spawn_responders {
                let mut server =
                    SocketServerToggle::new(&runtime.config.ws_addr, runtime.config.responder.clone());
                server
                    .start()
                    .await
                    .with_context(|| format!("Failed to bind {}", runtime.config.ws_addr))?;
                runtime.socket_server = Some(server);
            }
            runtime.connect_socket().await?;
        }

        info!(
            transports = ?runtime.config.transports,
            probe_timeout = ?runtime.config.harness.probe_timeout,
            "Latency runtime started"
        );
        Ok(runtime)
    }

    pub fn harness(&self) -> Arc<LatencyHarness> {
        Arc::clone(&self.harness)
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Address of the in-process WebSocket responder, when running.
    pub fn socket_server_url(&self) -> Option<String> {
        self.socket_server.as_ref().and_then(SocketServerToggle::url)
    }

    fn start_channel(&mut self) {
        let (transport, endpoint) = channel_link();
        let responder = ChannelResponder::new(self.config.responder.clone(), self.bus.clone())
            .spawn(endpoint, self.signals.clone());
        self.channel_responder = Some(responder);
        self.harness.attach_transport(Arc::new(transport));
        let _ = self.signals.send(TransportSignal::Status {
            transport: TransportKind::ChannelBased,
            ready: true,
        });
    }

    /// Connect (or reconnect) the socket transport.
    pub async fn connect_socket(&self) -> Result<()> {
        let url = self
            .socket_server_url()
            .unwrap_or_else(|| self.config.socket_target());
        let transport = SocketTransport::connect(&url, self.signals.clone())
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        self.harness.attach_transport(transport);
        Ok(())
    }

    /// Start or stop the in-process WebSocket responder.
    ///
    /// Stopping waits for the socket transport to report the disconnect;
    /// starting reconnects it. Returns whether the responder is now running.
    pub async fn toggle_socket_server(&mut self) -> Result<bool> {
        let mut status = self.bus.subscribe(EventFilter {
            topics: vec![EventTopic::TransportStatus],
            transports: vec![TransportKind::SocketBased],
        });
        let was_ready = self.harness.is_transport_ready(TransportKind::SocketBased);

        let Some(server) = self.socket_server.as_mut() else {
            bail!("No in-process WebSocket responder to toggle");
        };
        let running = server
            .toggle()
            .await
            .context("Failed to toggle the WebSocket responder")?;

        if running {
            self.connect_socket().await?;
        } else if was_ready {
            let disconnected = tokio::time::timeout(DISCONNECT_WAIT, async {
                while let Some(event) = status.recv().await {
                    if matches!(event, HarnessEvent::TransportStatusChanged { ready: false, .. }) {
                        return;
                    }
                }
            })
            .await;
            if disconnected.is_err() {
                warn!(wait = ?DISCONNECT_WAIT, "WebSocket disconnect not reported");
            }
        }
        info!(running, "WebSocket responder toggled");
        Ok(running)
    }

    /// Run one batch to completion (or abort) and report how it ended.
    pub async fn run_batch(
        &self,
        transport: TransportKind,
        count: usize,
        mode: BatchMode,
    ) -> Result<BatchOutcome> {
        let mut batches = self.bus.subscribe(EventFilter {
            topics: vec![EventTopic::Batches],
            transports: vec![transport],
        });

        self.harness
            .start_batch(transport, count, mode)
            .with_context(|| format!("Failed to start {transport} batch"))?;

        while let Some(event) = batches.recv().await {
            if let Some(outcome) = BatchOutcome::from_event(&event) {
                return Ok(outcome);
            }
        }
        bail!("Event bus closed before the {transport} batch finished")
    }

    /// Send one probe outside any batch and wait for its round trip.
    pub async fn ping(
        &self,
        transport: TransportKind,
        message: &str,
        wait: Duration,
    ) -> Result<Millis> {
        let mut responses = self.bus.subscribe(EventFilter {
            topics: vec![EventTopic::Responses],
            transports: vec![transport],
        });

        let token = self
            .harness
            .send_single(transport, message)
            .with_context(|| format!("Failed to send {transport} probe"))?;

        let elapsed = tokio::time::timeout(wait, async {
            while let Some(event) = responses.recv().await {
                if let HarnessEvent::ResponseReceived {
                    token: matched,
                    elapsed_ms,
                    ..
                } = event
                {
                    if matched == token {
                        return Some(elapsed_ms);
                    }
                }
            }
            None
        })
        .await
        .with_context(|| format!("No {transport} response within {wait:?}"))?;

        elapsed.context("Event bus closed while waiting for a response")
    }

    /// Have the channel responder start a probe and wait for its legs.
    pub async fn reverse_probe(&self, message: &str, wait: Duration) -> Result<LegTimings> {
        let Some(responder) = self.channel_responder.as_ref() else {
            bail!("The message channel is not running");
        };
        let mut round_trips = self.bus.subscribe(EventFilter {
            topics: vec![EventTopic::ReverseProbes],
            transports: vec![TransportKind::ChannelBased],
        });

        let token = responder
            .initiate(message)
            .context("Channel responder is gone")?;

        let legs = tokio::time::timeout(wait, async {
            while let Some(event) = round_trips.recv().await {
                if let HarnessEvent::ReverseRoundTrip {
                    token: matched,
                    total_ms,
                    outbound_ms,
                    processing_ms,
                    return_ms,
                    ..
                } = event
                {
                    if matched == token {
                        return Some(LegTimings {
                            total_ms,
                            outbound_ms,
                            processing_ms,
                            return_ms,
                        });
                    }
                }
            }
            None
        })
        .await
        .with_context(|| format!("No answer to responder probe {token} within {wait:?}"))?;

        legs.context("Event bus closed while waiting for the responder probe")
    }

    /// Stop background tasks and responders.
    pub async fn shutdown(mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        if let Some(responder) = self.channel_responder.take() {
            responder.abort();
        }
        if let Some(mut server) = self.socket_server.take() {
            server.stop().await;
        }

        info!("Shutdown complete");
    }
}
