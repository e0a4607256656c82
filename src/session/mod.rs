//! Session: owns the broker, the transport and the dispatch loop.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::{Result, Session};
//!
//! # async fn example() -> Result<()> {
//! let session = Session::connect("ws://127.0.0.1:9222/session").await?;
//! let status = session.status().await?;
//! println!("ready: {}", status.ready);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::broker::Broker;
use crate::error::{Error, Result};
use crate::identifiers::ContextId;
use crate::network::Network;
use crate::protocol::SessionCommand;
use crate::script::Script;
use crate::transport::{Inbound, InboundReceiver, Transport, WebSocketTransport};

// ============================================================================
// Submodules
// ============================================================================

/// Session configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use options::SessionOptions;

// ============================================================================
// SessionStatus
// ============================================================================

/// Result of `session.status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Whether the remote end can create new sessions.
    pub ready: bool,
    /// Implementation-defined detail.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Session
// ============================================================================

/// A connected protocol session.
///
/// Dropping the session stops the dispatch loop, fails pending commands and
/// asks the transport to close.
#[derive(Debug)]
pub struct Session {
    broker: Broker,
    dispatch: JoinHandle<()>,
}

impl Session {
    /// Connects over WebSocket with default options.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `url` is not a valid `ws`/`wss` URL
    /// - [`Error::ConnectionTimeout`] if the handshake times out
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_options(url, SessionOptions::new()).await
    }

    /// Connects over WebSocket.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`]; also [`Error::Config`] if `options` are invalid.
    pub async fn connect_with_options(url: &str, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let url = Url::parse(url).map_err(|e| Error::config(format!("invalid URL {url:?}: {e}")))?;

        let (transport, inbound) = WebSocketTransport::connect(&url, options.connect_timeout).await?;
        info!(%url, "Session connected");

        Self::with_transport(Arc::new(transport), inbound, options)
    }

    /// Builds a session over an existing transport and spawns its dispatch loop.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` are invalid.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        inbound: InboundReceiver,
        options: SessionOptions,
    ) -> Result<Self> {
        options.validate()?;

        let broker = Broker::new(transport, options);
        let dispatch = tokio::spawn(Self::run_dispatch_loop(broker.clone(), inbound));

        Ok(Self { broker, dispatch })
    }

    /// Feeds inbound frames to the broker in arrival order.
    async fn run_dispatch_loop(broker: Broker, mut inbound: InboundReceiver) {
        let reason = loop {
            match inbound.recv().await {
                Some(Inbound::Text(text)) => {
                    if let Err(e) = broker.on_message(&text) {
                        warn!(error = %e, "Dropped inbound frame");
                    }
                }
                Some(Inbound::Closed { reason }) => break reason,
                None => break "inbound stream ended".to_string(),
            }
        };

        broker.close(&reason);
        debug!(reason, "Dispatch loop terminated");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the broker.
    #[inline]
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Returns the network domain facade.
    #[must_use]
    pub fn network(&self) -> Network {
        Network::new(self.broker.clone())
    }

    /// Returns the script domain facade.
    #[must_use]
    pub fn script(&self) -> Script {
        Script::new(self.broker.clone())
    }

    /// Returns `true` once the session is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.broker.is_closed()
    }

    // ========================================================================
    // Session Commands
    // ========================================================================

    /// Queries remote end readiness (`session.status`).
    ///
    /// # Errors
    ///
    /// Returns any error of [`Broker::send`].
    pub async fn status(&self) -> Result<SessionStatus> {
        self.broker.send(SessionCommand::Status).await
    }

    /// Enables events on the remote end (`session.subscribe`).
    ///
    /// Local handlers only receive events the remote end was asked to emit.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `events` is empty
    /// - Any error of [`Broker::send`]
    pub async fn subscribe_events(
        &self,
        events: &[&str],
        contexts: Option<Vec<ContextId>>,
    ) -> Result<()> {
        if events.is_empty() {
            return Err(Error::invalid_argument("event list must not be empty"));
        }
        let _: Value = self
            .broker
            .send(SessionCommand::Subscribe {
                events: events.iter().map(|e| (*e).to_string()).collect(),
                contexts,
            })
            .await?;
        Ok(())
    }

    /// Disables events on the remote end (`session.unsubscribe`).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `events` is empty
    /// - Any error of [`Broker::send`]
    pub async fn unsubscribe_events(
        &self,
        events: &[&str],
        contexts: Option<Vec<ContextId>>,
    ) -> Result<()> {
        if events.is_empty() {
            return Err(Error::invalid_argument("event list must not be empty"));
        }
        let _: Value = self
            .broker
            .send(SessionCommand::Unsubscribe {
                events: events.iter().map(|e| (*e).to_string()).collect(),
                contexts,
            })
            .await?;
        Ok(())
    }

    /// Ends the session on the remote end (`session.end`), then closes it.
    ///
    /// # Errors
    ///
    /// Returns the `session.end` error, if any; the session is closed either way.
    pub async fn end(&self) -> Result<()> {
        let result = self
            .broker
            .send::<Value>(SessionCommand::End)
            .await
            .map(|_| ());
        self.close().await?;
        result
    }

    /// Closes the session. Idempotent.
    ///
    /// Pending commands fail with [`Error::ConnectionClosed`]; every
    /// subscription is dropped.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the close handshake fails.
    pub async fn close(&self) -> Result<()> {
        self.broker.close("closed by session");
        self.broker.transport().close().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispatch.abort();
        self.broker.close("session dropped");

        let transport = Arc::clone(self.broker.transport());
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = transport.close().await;
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::transport::{ChannelTransport, RemoteEnd};

    fn session() -> (Session, RemoteEnd) {
        let (transport, inbound, remote) = ChannelTransport::pair();
        let session = Session::with_transport(Arc::new(transport), inbound, SessionOptions::new())
            .expect("session");
        (session, remote)
    }

    #[tokio::test]
    async fn test_status() {
        let (session, mut remote) = session();

        let responder = tokio::spawn(async move {
            let frame = remote.recv_json().await.expect("frame");
            assert_eq!(frame["method"], "session.status");
            remote
                .push_json(&json!({ "id": frame["id"], "result": { "ready": true, "message": "ok" } }))
                .expect("push");
            remote
        });

        let status = session.status().await.expect("status");
        assert!(status.ready);
        assert_eq!(status.message, "ok");
        let _ = responder.await;
    }

    #[tokio::test]
    async fn test_subscribe_events() {
        let (session, mut remote) = session();

        let responder = tokio::spawn(async move {
            let frame = remote.recv_json().await.expect("frame");
            assert_eq!(frame["method"], "session.subscribe");
            assert_eq!(frame["params"], json!({ "events": ["network"] }));
            remote
                .push_json(&json!({ "id": frame["id"], "result": {} }))
                .expect("push");
            remote
        });

        session.subscribe_events(&["network"], None).await.expect("subscribe");
        let _ = responder.await;
    }

    #[tokio::test]
    async fn test_empty_event_list_is_rejected() {
        let (session, mut remote) = session();
        let err = session.subscribe_events(&[], None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(remote.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_remote_close_fails_pending() {
        let (session, mut remote) = session();

        let closer = tokio::spawn(async move {
            let _ = remote.recv_json().await.expect("frame");
            remote.close("browser exited");
            remote
        });

        let err = session.status().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        let _ = closer.await;
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, remote) = session();
        session.close().await.expect("close");
        session.close().await.expect("close again");
        assert!(session.is_closed());
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let (transport, inbound, _remote) = ChannelTransport::pair();
        let err = Session::with_transport(
            Arc::new(transport),
            inbound,
            SessionOptions::new().with_max_pending(0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
