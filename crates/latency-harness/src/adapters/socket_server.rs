//! WebSocket responder (server side).
//!
//! Accepts any number of connections and echoes each JSON probe after the
//! configured processing delay. The server can be stopped and started again
//! at runtime through [`SocketServerToggle`].

use futures_util::{SinkExt, StreamExt};
use latency_types::ProbeRequest;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::adapters::responder::echo_after;
use crate::domain::ResponderConfig;
use crate::error::TransportError;

/// Echo server for socket probes.
pub struct SocketResponder {
    config: ResponderConfig,
}

/// A running [`SocketResponder`]. Dropping the handle stops the server.
pub struct SocketResponderHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SocketResponder {
    pub fn new(config: ResponderConfig) -> Self {
        Self { config }
    }

    /// Bind `addr` and start accepting connections.
    pub async fn bind(self, addr: &str) -> Result<SocketResponderHandle, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "WebSocket responder listening");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, self.config, shutdown_rx));

        Ok(SocketResponderHandle {
            local_addr,
            shutdown,
            task,
        })
    }
}

impl SocketResponderHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL clients connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Close every connection and wait for the accept loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
        info!(addr = %self.local_addr, "WebSocket responder stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: ResponderConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let config = config.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, config, shutdown).await {
                            warn!(peer = %peer, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: ResponderConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    debug!(peer = %peer, "WebSocket client connected");

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = msg.is_close();
            if write.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = tx.send(Message::Close(None));
                break;
            }
            next = read.next() => match next {
                Some(Ok(Message::Text(text))) => {
                    let request: ProbeRequest = match serde_json::from_str(text.as_str()) {
                        Ok(request) => request,
                        Err(e) => {
                            warn!(peer = %peer, error = %e, "Dropping undecodable probe");
                            continue;
                        }
                    };
                    let delay = config.processing_delay;
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let echo = echo_after(&request, delay).await;
                        match serde_json::to_string(&echo) {
                            Ok(json) => {
                                let _ = tx.send(Message::Text(json.into()));
                            }
                            Err(e) => warn!(error = %e, "Failed to encode echo"),
                        }
                    });
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(peer = %peer, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    }

    drop(tx);
    let _ = writer.await;
    debug!(peer = %peer, "WebSocket client disconnected");
    Ok(())
}

/// Start/stop switch around a [`SocketResponder`] bound to a fixed address.
pub struct SocketServerToggle {
    addr: String,
    config: ResponderConfig,
    running: Option<SocketResponderHandle>,
}

impl SocketServerToggle {
    pub fn new(addr: impl Into<String>, config: ResponderConfig) -> Self {
        Self {
            addr: addr.into(),
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(SocketResponderHandle::is_running)
    }

    /// URL of the running server.
    pub fn url(&self) -> Option<String> {
        self.running.as_ref().map(SocketResponderHandle::url)
    }

    pub async fn start(&mut self) -> Result<SocketAddr, TransportError> {
        if let Some(handle) = &self.running {
            return Ok(handle.local_addr());
        }
        let handle = SocketResponder::new(self.config.clone())
            .bind(&self.addr)
            .await?;
        let addr = handle.local_addr();
        self.running = Some(handle);
        Ok(addr)
    }

    pub async fn stop(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.stop().await;
        }
    }

    /// Flip the server state. Returns whether it is now running.
    pub async fn toggle(&mut self) -> Result<bool, TransportError> {
        if self.running.is_some() {
            self.stop().await;
            Ok(false)
        } else {
            self.start().await?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latency_types::{CorrelationToken, ProbeEcho};
    use tokio_tungstenite::connect_async;

    #[tokio::test]
    async fn test_echo_over_websocket() {
        let handle = SocketResponder::new(ResponderConfig::immediate())
            .bind("127.0.0.1:0")
            .await
            .unwrap();

        let (mut ws, _) = connect_async(handle.url()).await.unwrap();
        let request = ProbeRequest {
            message: "hello".into(),
            token: CorrelationToken::from("ws-1"),
            send_timestamp: 2.0,
        };
        ws.send(Message::Text(serde_json::to_string(&request).unwrap().into()))
            .await
            .unwrap();

        let reply = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => break text,
                _ => continue,
            }
        };
        let echo: ProbeEcho = serde_json::from_str(reply.as_str()).unwrap();
        assert_eq!(echo.token.as_str(), "ws-1");
        assert_eq!(echo.original_message, "hello");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_toggle() {
        let mut toggle = SocketServerToggle::new("127.0.0.1:0", ResponderConfig::immediate());
        assert!(!toggle.is_running());

        assert!(toggle.toggle().await.unwrap());
        assert!(toggle.is_running());
        assert!(toggle.url().is_some());

        assert!(!toggle.toggle().await.unwrap());
        assert!(!toggle.is_running());
        assert!(toggle.url().is_none());
    }
}
