//! WebSocket transport and its I/O loop.
//!
//! [`WebSocketTransport::connect`] performs the client handshake and spawns
//! a tokio task that owns the socket:
//!
//! - Outgoing frames from the session are written in submission order
//! - Incoming text frames are forwarded to the inbound stream
//! - Close, error or end of stream emit [`Inbound::Closed`] and stop the loop

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Inbound, InboundReceiver, Transport};

// ============================================================================
// Types
// ============================================================================

/// The socket type produced by the client handshake.
type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Internal commands for the I/O loop.
enum LoopCommand {
    /// Write a frame and report the outcome.
    Send {
        text: String,
        done_tx: oneshot::Sender<Result<()>>,
    },
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket client connection to a remote end.
///
/// `WebSocketTransport` is `Send + Sync`; frames from concurrent callers are
/// written in the order the loop receives them.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Channel for sending commands to the I/O loop.
    command_tx: mpsc::UnboundedSender<LoopCommand>,
}

impl WebSocketTransport {
    /// Connects to `url` and spawns the I/O loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `url` is not a `ws` or `wss` URL
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds `connect_timeout`
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(url: &Url, connect_timeout: Duration) -> Result<(Self, InboundReceiver)> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "expected a ws:// or wss:// URL, got {url}"
            )));
        }

        debug!(%url, "Connecting");

        let (socket, _response) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

        debug!(%url, "WebSocket connected");

        Ok(Self::from_socket(socket))
    }

    /// Wraps an established socket and spawns the I/O loop.
    fn from_socket(socket: Socket) -> (Self, InboundReceiver) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_io_loop(socket, command_rx, inbound_tx));

        (Self { command_tx }, inbound_rx)
    }

    /// I/O loop that owns the socket.
    async fn run_io_loop(
        socket: Socket,
        mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
        inbound_tx: mpsc::UnboundedSender<Inbound>,
    ) {
        let (mut ws_write, mut ws_read) = socket.split();

        let reason = loop {
            tokio::select! {
                // Incoming frames from the remote end
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(len = text.len(), "Frame received");
                            if inbound_tx.send(Inbound::Text(text.as_str().to_owned())).is_err() {
                                break "session dropped the inbound stream".to_string();
                            }
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "closed by remote".to_string());
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break e.to_string();
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break "stream ended".to_string();
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the session
                command = command_rx.recv() => {
                    match command {
                        Some(LoopCommand::Send { text, done_tx }) => {
                            let result = ws_write
                                .send(Message::Text(text.into()))
                                .await
                                .map_err(|e| Error::connection(e.to_string()));
                            if let Err(e) = &result {
                                warn!(error = %e, "Failed to write frame");
                            }
                            let _ = done_tx.send(result);
                        }

                        Some(LoopCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break "closed by session".to_string();
                        }

                        None => {
                            debug!("Command channel closed");
                            let _ = ws_write.close().await;
                            break "transport dropped".to_string();
                        }
                    }
                }
            }
        };

        let _ = inbound_tx.send(Inbound::Closed { reason });

        // Unblock senders whose frames were queued behind the shutdown
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            if let LoopCommand::Send { done_tx, .. } = command {
                let _ = done_tx.send(Err(Error::ConnectionClosed));
            }
        }

        debug!("I/O loop terminated");
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, text: String) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command_tx
            .send(LoopCommand::Send { text, done_tx })
            .map_err(|_| Error::ConnectionClosed)?;
        done_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    async fn close(&self) -> Result<()> {
        let _ = self.command_tx.send(LoopCommand::Shutdown);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_rejects_non_websocket_url() {
        let url = Url::parse("http://127.0.0.1:9/").expect("url");
        let err = WebSocketTransport::connect(&url, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_round_trip_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        // Echo server: replies to every text frame with the same text
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            while let Some(Ok(message)) = ws.next().await {
                if message.is_text() && ws.send(message).await.is_err() {
                    break;
                }
            }
        });

        let url = Url::parse(&format!("ws://{addr}/")).expect("url");
        let (transport, mut inbound) = WebSocketTransport::connect(&url, Duration::from_secs(5))
            .await
            .expect("connect");

        transport.send("{\"ping\":1}".to_string()).await.expect("send");
        assert_eq!(
            inbound.recv().await,
            Some(Inbound::Text("{\"ping\":1}".to_string()))
        );

        transport.close().await.expect("close");
        assert!(matches!(inbound.recv().await, Some(Inbound::Closed { .. })));
    }
}
