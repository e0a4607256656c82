//! Error types for the BiDi session layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webdriver_bidi::{Result, Error};
//!
//! async fn example(request: &BlockedRequest) -> Result<()> {
//!     match request.fail().await {
//!         Err(Error::AlreadyDecided { .. }) => Ok(()),
//!         other => other,
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Decode`], [`Error::UnknownVariant`] |
//! | Remote | [`Error::Remote`], [`Error::Script`] |
//! | Caller | [`Error::AlreadyDecided`], [`Error::InvalidPhase`], [`Error::PhaseNotIntercepted`], [`Error::InterceptRemoved`], [`Error::SessionClosed`], [`Error::InvalidArgument`] |
//! | Execution | [`Error::CommandTimeout`], [`Error::TooManyPendingCommands`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{CommandId, InterceptId, RequestId};
use crate::protocol::types::InterceptPhase;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport connection failed.
    ///
    /// Returned when the channel cannot be opened or a send fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Transport closed while the operation was outstanding.
    ///
    /// Every pending command fails with this when the session is torn down.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed inbound message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A wire value could not be decoded into its family.
    #[error("Cannot decode {family}: {message}")]
    Decode {
        /// Wire value family being decoded.
        family: &'static str,
        /// What was wrong with the value.
        message: String,
    },

    /// A wire value carried a discriminator outside the family's closed set.
    #[error("Unknown {family} variant: {tag}")]
    UnknownVariant {
        /// Wire value family being decoded.
        family: &'static str,
        /// The unrecognized discriminator.
        tag: String,
    },

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The remote end answered a command with an error response.
    #[error("Remote error ({code}): {message}")]
    Remote {
        /// Protocol error code, e.g. `no such intercept`.
        code: String,
        /// Human-readable message.
        message: String,
        /// Remote stack trace, when provided.
        stacktrace: Option<String>,
    },

    /// Script evaluation threw.
    #[error("Script error: {message}")]
    Script {
        /// Exception text reported by the remote end.
        message: String,
    },

    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Invalid argument, detected before anything was sent.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// A terminal decision was already issued for this blocked request.
    #[error("Request {request_id} already received a decision")]
    AlreadyDecided {
        /// The blocked request.
        request_id: RequestId,
    },

    /// The decision is not valid in the phase the request was blocked in.
    #[error("{decision} is not valid for request {request_id} blocked in {phase}")]
    InvalidPhase {
        /// The blocked request.
        request_id: RequestId,
        /// Phase the request was reported blocked in.
        phase: InterceptPhase,
        /// Decision that was attempted.
        decision: &'static str,
    },

    /// A handler was registered for a phase the intercept does not cover.
    #[error("Intercept {intercept_id} was not created for phase {phase}")]
    PhaseNotIntercepted {
        /// The intercept.
        intercept_id: InterceptId,
        /// The phase that was requested.
        phase: InterceptPhase,
    },

    /// The intercept has already been removed.
    #[error("Intercept {intercept_id} has been removed")]
    InterceptRemoved {
        /// The removed intercept.
        intercept_id: InterceptId,
    },

    /// The session has been torn down.
    #[error("Session closed")]
    SessionClosed,

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Command timed out waiting for its response.
    #[error("Command {command_id} ({method}) timed out after {timeout_ms}ms")]
    CommandTimeout {
        /// Id of the command that timed out.
        command_id: CommandId,
        /// Command method.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Too many commands outstanding on this session.
    #[error("Too many pending commands: {pending}/{max}")]
    TooManyPendingCommands {
        /// Commands currently pending.
        pending: usize,
        /// Configured maximum.
        max: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a decode error for a wire value family.
    #[inline]
    pub fn decode(family: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            family,
            message: message.into(),
        }
    }

    /// Creates an unknown-variant error for a wire value family.
    #[inline]
    pub fn unknown_variant(family: &'static str, tag: impl Into<String>) -> Self {
        Self::UnknownVariant {
            family,
            tag: tag.into(),
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(
        code: impl Into<String>,
        message: impl Into<String>,
        stacktrace: Option<String>,
    ) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
            stacktrace,
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an already-decided error.
    #[inline]
    pub fn already_decided(request_id: RequestId) -> Self {
        Self::AlreadyDecided { request_id }
    }

    /// Creates an invalid phase error.
    #[inline]
    pub fn invalid_phase(request_id: RequestId, phase: InterceptPhase, decision: &'static str) -> Self {
        Self::InvalidPhase {
            request_id,
            phase,
            decision,
        }
    }

    /// Creates a phase-not-intercepted error.
    #[inline]
    pub fn phase_not_intercepted(intercept_id: InterceptId, phase: InterceptPhase) -> Self {
        Self::PhaseNotIntercepted {
            intercept_id,
            phase,
        }
    }

    /// Creates an intercept-removed error.
    #[inline]
    pub fn intercept_removed(intercept_id: InterceptId) -> Self {
        Self::InterceptRemoved { intercept_id }
    }

    /// Creates a command timeout error.
    #[inline]
    pub fn command_timeout(command_id: CommandId, method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CommandTimeout {
            command_id,
            method: method.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::CommandTimeout { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this is a local precondition violation.
    ///
    /// Caller errors are raised synchronously, before anything is sent.
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::AlreadyDecided { .. }
                | Self::InvalidPhase { .. }
                | Self::PhaseNotIntercepted { .. }
                | Self::InterceptRemoved { .. }
                | Self::SessionClosed
        )
    }

    /// Returns `true` if the remote end rejected the command.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Script { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::CommandTimeout { .. }
                | Self::TooManyPendingCommands { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
