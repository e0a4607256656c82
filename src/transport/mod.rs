//! Transport layer.
//!
//! A transport moves text frames between the session and the remote end.
//! The session only needs to write frames and close; inbound frames arrive
//! on an `mpsc` stream handed over when the transport is created.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   Transport::send     ┌─────────────────┐
//! │  Broker         │──────────────────────►│  Remote end     │
//! │                 │                       │  (browser)      │
//! │  dispatch loop  │◄──────────────────────│                 │
//! └─────────────────┘   Inbound stream      └─────────────────┘
//! ```
//!
//! Connection policy (reconnect, retries) is not handled here; a closed
//! transport ends the session.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | WebSocket client and its I/O loop |
//! | `channel` | In-memory duplex for tests and embedding |

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-memory transport.
pub mod channel;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelTransport, RemoteEnd};
pub use websocket::WebSocketTransport;

// ============================================================================
// Types
// ============================================================================

/// One item of the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// The transport closed; no further items follow.
    Closed {
        /// Why the transport closed.
        reason: String,
    },
}

/// Receiving half of a transport's inbound stream.
pub type InboundReceiver = mpsc::UnboundedReceiver<Inbound>;

// ============================================================================
// Transport
// ============================================================================

/// Outbound half of a connection to the remote end.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConnectionClosed`] or a transport error if the
    /// frame could not be handed to the connection.
    async fn send(&self, text: String) -> Result<()>;

    /// Closes the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the close handshake fails.
    async fn close(&self) -> Result<()>;
}
