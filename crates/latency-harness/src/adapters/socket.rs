//! WebSocket transport (client side).
//!
//! Probes are JSON text frames. A writer task drains an unbounded queue so
//! `dispatch` never blocks; a reader task forwards every inbound text frame
//! to the receipt loop. Whichever task notices the connection going away
//! first reports it; the other stays quiet.

use futures_util::{SinkExt, StreamExt};
use latency_types::{ProbeRequest, TransportKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::ports::{FramePayload, ProbeTransport, TransportSignal};

/// Sending half of a WebSocket connection.
pub struct SocketTransport {
    outbound: mpsc::UnboundedSender<String>,
    ready: Arc<AtomicBool>,
}

impl SocketTransport {
    /// Connect to a responder and start the reader and writer tasks.
    ///
    /// Emits a ready status signal on success and a not-ready one when the
    /// connection closes.
    pub async fn connect(
        url: &str,
        signals: mpsc::UnboundedSender<TransportSignal>,
    ) -> Result<Arc<Self>, TransportError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(url = %url, "WebSocket connected");

        let (mut write, mut read) = ws_stream.split();
        let (outbound, mut queue) = mpsc::unbounded_channel::<String>();
        let ready = Arc::new(AtomicBool::new(true));

        let writer_ready = ready.clone();
        let writer_signals = signals.clone();
        tokio::spawn(async move {
            while let Some(text) = queue.recv().await {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!(error = %e, "WebSocket write failed");
                    mark_disconnected(&writer_ready, &writer_signals);
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader_ready = ready.clone();
        let reader_signals = signals.clone();
        let reader_url = url.to_string();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text.as_str().to_owned(),
                    Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(url = %reader_url, error = %e, "WebSocket read failed");
                        break;
                    }
                };

                let frame = TransportSignal::Frame {
                    transport: TransportKind::SocketBased,
                    payload: FramePayload::Encoded(text),
                };
                if reader_signals.send(frame).is_err() {
                    break;
                }
            }

            debug!(url = %reader_url, "WebSocket reader stopped");
            mark_disconnected(&reader_ready, &reader_signals);
        });

        let _ = signals.send(TransportSignal::Status {
            transport: TransportKind::SocketBased,
            ready: true,
        });

        Ok(Arc::new(Self { outbound, ready }))
    }
}

/// Flip `ready` off and report it, at most once per connection.
fn mark_disconnected(ready: &AtomicBool, signals: &mpsc::UnboundedSender<TransportSignal>) {
    if ready.swap(false, Ordering::SeqCst) {
        let _ = signals.send(TransportSignal::Status {
            transport: TransportKind::SocketBased,
            ready: false,
        });
    }
}

impl ProbeTransport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::SocketBased
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn dispatch(&self, request: &ProbeRequest) -> Result<(), TransportError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let text =
            serde_json::to_string(request).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }
}
