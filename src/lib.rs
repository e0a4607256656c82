//! WebDriver BiDi session layer.
//!
//! This library speaks the WebDriver BiDi protocol to a remote end (a
//! browser or a proxy in front of one) over a single bidirectional message
//! stream.
//!
//! # Architecture
//!
//! - **Session**: owns the transport, the [`Broker`] and the dispatch task
//! - **Broker**: correlates command ids with responses and routes events to
//!   subscriptions in registration order
//! - **Network / Script**: typed facades over the broker
//! - **Intercept**: blocks matching requests; each blocked request surfaces
//!   as a [`BlockedRequest`] accepting exactly one decision
//!
//! Inbound messages are processed strictly in arrival order. A command call
//! suspends only its own task; async handlers are spawned, so a handler that
//! issues commands never stalls dispatch.
//!
//! # Quick Start
//!
//! ```no_run
//! use webdriver_bidi::{AuthDecision, Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::connect("ws://127.0.0.1:9222/session").await?;
//!     session.subscribe_events(&["network"], None).await?;
//!
//!     // Answer every basic-auth challenge
//!     let intercept = session
//!         .network()
//!         .intercept_auth(Vec::new(), |_params, request| async move {
//!             request
//!                 .continue_with_auth(AuthDecision::basic("user", "pass"))
//!                 .await
//!         })
//!         .await?;
//!
//!     // ... drive the browser ...
//!
//!     intercept.remove().await?;
//!     session.end().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`broker`] | Command correlation and event dispatch |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`network`] | Intercepts, blocked requests, lifecycle listeners |
//! | [`protocol`] | Wire frames, commands, events and value codecs |
//! | [`script`] | Script evaluation and preload scripts |
//! | [`session`] | Session lifecycle and options |
//! | [`transport`] | WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Command correlation and event dispatch.
pub mod broker;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Network domain: intercepts and blocked requests.
pub mod network;

/// Protocol message types and value codecs.
pub mod protocol;

/// Script domain.
pub mod script;

/// Session lifecycle.
///
/// Use [`Session::connect()`] or [`Session::with_transport()`].
pub mod session;

/// Message transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Broker types
pub use broker::{Broker, EventFilter, EventHandler, Subscription};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{
    CommandId, ContextId, InterceptId, NavigationId, PreloadScriptId, RealmId, RequestId,
    SubscriptionId,
};

// Network types
pub use network::{
    AuthDecision, BlockedRequest, Intercept, InterceptOptions, Network, RequestState,
};

// Protocol types
pub use protocol::types::{
    AuthCredentials, BytesValue, EvaluateResult, InterceptPhase, LocalValue, RemoteValue,
    Target, UrlPattern, UrlPatternPattern,
};
pub use protocol::{
    Event, ParsedEvent, RequestOverrides, ResponseOverrides, SyntheticResponse, WireValue,
};

// Script types
pub use script::Script;

// Session types
pub use session::{Session, SessionOptions, SessionStatus};

// Transport types
pub use transport::{ChannelTransport, Inbound, RemoteEnd, Transport, WebSocketTransport};
