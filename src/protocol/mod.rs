//! Wire protocol message types.
//!
//! This module defines the frames exchanged with the remote end and the
//! polymorphic value families carried inside them.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command result or error |
//! | `Event` | Remote → Local | Browser notification |
//!
//! # Command Naming
//!
//! Commands follow `module.methodName` format:
//!
//! - `network.addIntercept`
//! - `network.continueRequest`
//! - `script.callFunction`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event frame and typed lifecycle payloads |
//! | `request` | Request, Response and inbound classification |
//! | `types` | Polymorphic wire value families |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by module.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

/// Polymorphic wire value families.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, ContinueRequestParameters, ContinueResponseParameters, NetworkCommand,
    ProvideResponseParameters, RequestOverrides, ResponseOverrides, ScriptCommand,
    SessionCommand, SyntheticResponse,
};
pub use event::{
    AuthRequiredParameters, BaseParameters, BeforeRequestSentParameters, BlockingEvent, Event,
    FetchErrorParameters, LifecycleEvent, ParsedEvent, ResponseCompletedParameters,
    ResponseStartedParameters,
};
pub use request::{Message, Request, Response, ResponseType};
pub use types::WireValue;
