//! In-memory transport.
//!
//! [`ChannelTransport::pair`] returns the session side of a duplex channel
//! together with a [`RemoteEnd`] that plays the browser: it reads the frames
//! the session sent and pushes responses and events back.
//!
//! ```ignore
//! let (transport, inbound, mut remote) = ChannelTransport::pair();
//! let session = Session::with_transport(Arc::new(transport), inbound, SessionOptions::new())?;
//!
//! let frame = remote.recv_json().await?;
//! remote.push_json(&json!({ "id": frame["id"], "result": {} }))?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};

use super::{Inbound, InboundReceiver, Transport};

// ============================================================================
// ChannelTransport
// ============================================================================

/// Session side of an in-memory duplex.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    /// Frames sent by the session.
    outgoing: mpsc::UnboundedSender<String>,
    /// Inbound stream, used to report closure.
    inbound: mpsc::UnboundedSender<Inbound>,
    /// Shared closed flag.
    closed: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Creates a connected transport, its inbound stream and the remote end.
    #[must_use]
    pub fn pair() -> (Self, InboundReceiver, RemoteEnd) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let transport = Self {
            outgoing: outgoing_tx,
            inbound: inbound_tx.clone(),
            closed: Arc::clone(&closed),
        };
        let remote = RemoteEnd {
            outgoing: outgoing_rx,
            inbound: inbound_tx,
            closed,
        };

        (transport, inbound_rx, remote)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }
        trace!(len = text.len(), "Channel frame sent");
        self.outgoing.send(text).map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.inbound.send(Inbound::Closed {
                reason: "closed by session".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// RemoteEnd
// ============================================================================

/// Remote side of an in-memory duplex.
#[derive(Debug)]
pub struct RemoteEnd {
    /// Frames sent by the session.
    outgoing: mpsc::UnboundedReceiver<String>,
    /// Inbound stream of the session.
    inbound: mpsc::UnboundedSender<Inbound>,
    /// Shared closed flag.
    closed: Arc<AtomicBool>,
}

impl RemoteEnd {
    /// Waits for the next frame the session sent.
    ///
    /// Returns `None` once the session side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.outgoing.recv().await
    }

    /// Waits for the next frame and parses it as JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the session side is gone
    /// - [`Error::Json`] if the frame is not JSON
    pub async fn recv_json(&mut self) -> Result<Value> {
        let text = self.recv().await.ok_or(Error::ConnectionClosed)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Returns a frame the session already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.outgoing.try_recv().ok()
    }

    /// Pushes a text frame to the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session stopped reading.
    pub fn push(&self, text: impl Into<String>) -> Result<()> {
        self.inbound
            .send(Inbound::Text(text.into()))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Pushes a JSON frame to the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session stopped reading.
    pub fn push_json(&self, value: &Value) -> Result<()> {
        self.push(value.to_string())
    }

    /// Closes the connection from the remote side.
    pub fn close(&self, reason: impl Into<String>) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.inbound.send(Inbound::Closed {
                reason: reason.into(),
            });
        }
    }

    /// Returns `true` once either side closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (transport, mut inbound, mut remote) = ChannelTransport::pair();

        transport.send("{\"id\":1}".to_string()).await.expect("send");
        assert_eq!(remote.recv_json().await.expect("recv"), json!({ "id": 1 }));

        remote.push_json(&json!({ "id": 1, "result": {} })).expect("push");
        assert!(matches!(inbound.recv().await, Some(Inbound::Text(_))));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, mut inbound, remote) = ChannelTransport::pair();

        transport.close().await.expect("close");
        transport.close().await.expect("second close is a no-op");
        assert!(remote.is_closed());

        let err = transport.send("x".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        assert!(matches!(inbound.recv().await, Some(Inbound::Closed { .. })));
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remote_close_reports_reason() {
        let (_transport, mut inbound, remote) = ChannelTransport::pair();
        remote.close("browser exited");

        match inbound.recv().await {
            Some(Inbound::Closed { reason }) => assert_eq!(reason, "browser exited"),
            other => panic!("unexpected inbound item: {other:?}"),
        }
    }
}
