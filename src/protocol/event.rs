//! Event message types.
//!
//! Events are notifications sent from the remote end when browser activity
//! occurs. The broker parses each inbound event once into an [`Event`] and
//! shares it with every subscription that receives it; each handler then
//! decodes the params into the typed payload it expects.
//!
//! # Network Events
//!
//! | Method | Payload | Blocking phase |
//! |--------|---------|----------------|
//! | `network.beforeRequestSent` | [`BeforeRequestSentParameters`] | `beforeRequestSent` |
//! | `network.responseStarted` | [`ResponseStartedParameters`] | `responseStarted` |
//! | `network.authRequired` | [`AuthRequiredParameters`] | `authRequired` |
//! | `network.responseCompleted` | [`ResponseCompletedParameters`] | - |
//! | `network.fetchError` | [`FetchErrorParameters`] | - |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ContextId, InterceptId, NavigationId};
use crate::network::request::DecisionSlot;

use super::types::{Initiator, InterceptPhase, RequestData, ResponseData};

// ============================================================================
// Event Names
// ============================================================================

/// `network.beforeRequestSent`.
pub const BEFORE_REQUEST_SENT: &str = "network.beforeRequestSent";
/// `network.responseStarted`.
pub const RESPONSE_STARTED: &str = "network.responseStarted";
/// `network.responseCompleted`.
pub const RESPONSE_COMPLETED: &str = "network.responseCompleted";
/// `network.authRequired`.
pub const AUTH_REQUIRED: &str = "network.authRequired";
/// `network.fetchError`.
pub const FETCH_ERROR: &str = "network.fetchError";

// ============================================================================
// Event
// ============================================================================

/// An event notification from the remote end.
///
/// # Format
///
/// ```json
/// {
///   "type": "event",
///   "method": "module.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Decision state shared by every blocked-request handle built from
    /// this message.
    #[serde(skip)]
    pub(crate) decision: DecisionSlot,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            decision: DecisionSlot::default(),
        }
    }

    /// Returns the module name from the method.
    #[inline]
    #[must_use]
    pub fn module(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Decodes the params into a typed lifecycle payload.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the event is not `E::METHOD`
    /// - [`Error::Decode`] if the params do not match the payload schema
    pub fn decode<E: LifecycleEvent>(&self) -> Result<E> {
        if self.method != E::METHOD {
            return Err(Error::protocol(format!(
                "cannot decode {} as {}",
                self.method,
                E::METHOD
            )));
        }
        self.params_as()
    }

    /// Deserializes the params into an arbitrary type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the params do not match `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.params).map_err(|e| Error::decode("event params", e.to_string()))
    }

    /// Parses the event into a typed variant.
    ///
    /// Event names without a typed payload parse to [`ParsedEvent::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a known event has malformed params.
    pub fn parse(&self) -> Result<ParsedEvent> {
        Ok(match self.method.as_str() {
            BEFORE_REQUEST_SENT => ParsedEvent::BeforeRequestSent(self.params_as()?),
            RESPONSE_STARTED => ParsedEvent::ResponseStarted(self.params_as()?),
            RESPONSE_COMPLETED => ParsedEvent::ResponseCompleted(self.params_as()?),
            AUTH_REQUIRED => ParsedEvent::AuthRequired(self.params_as()?),
            FETCH_ERROR => ParsedEvent::FetchError(self.params_as()?),
            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        })
    }

    /// Returns `true` if the params report the request as blocked by `intercept`.
    #[must_use]
    pub fn is_blocked_by(&self, intercept: &InterceptId) -> bool {
        let blocked = self
            .params
            .get("isBlocked")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        blocked
            && self
                .params
                .get("intercepts")
                .and_then(Value::as_array)
                .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(intercept.as_str())))
    }
}

// ============================================================================
// Lifecycle Payloads
// ============================================================================

/// Fields shared by every network lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseParameters {
    /// Browsing context that issued the request.
    #[serde(default)]
    pub context: Option<ContextId>,
    /// Whether the request is blocked awaiting a decision.
    #[serde(default)]
    pub is_blocked: bool,
    /// Navigation the request belongs to.
    #[serde(default)]
    pub navigation: Option<NavigationId>,
    /// Number of redirects so far.
    #[serde(default)]
    pub redirect_count: u64,
    /// The request.
    pub request: RequestData,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// Intercepts blocking the request; only present when blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercepts: Option<Vec<InterceptId>>,
}

impl BaseParameters {
    /// Returns `true` if `intercept` is among the blocking intercepts.
    #[must_use]
    pub fn blocked_by(&self, intercept: &InterceptId) -> bool {
        self.is_blocked
            && self
                .intercepts
                .as_ref()
                .is_some_and(|ids| ids.contains(intercept))
    }
}

/// `network.beforeRequestSent` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeforeRequestSentParameters {
    /// Shared fields.
    #[serde(flatten)]
    pub base: BaseParameters,
    /// What caused the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<Initiator>,
}

/// `network.responseStarted` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseStartedParameters {
    /// Shared fields.
    #[serde(flatten)]
    pub base: BaseParameters,
    /// Response headers and status.
    pub response: ResponseData,
}

/// `network.responseCompleted` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCompletedParameters {
    /// Shared fields.
    #[serde(flatten)]
    pub base: BaseParameters,
    /// The completed response.
    pub response: ResponseData,
}

/// `network.authRequired` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequiredParameters {
    /// Shared fields.
    #[serde(flatten)]
    pub base: BaseParameters,
    /// The challenging response.
    pub response: ResponseData,
}

/// `network.fetchError` params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchErrorParameters {
    /// Shared fields.
    #[serde(flatten)]
    pub base: BaseParameters,
    /// Error description.
    pub error_text: String,
}

// ============================================================================
// LifecycleEvent
// ============================================================================

/// A typed network lifecycle payload.
pub trait LifecycleEvent: DeserializeOwned + Send + Sync + 'static {
    /// Event method this payload belongs to.
    const METHOD: &'static str;

    /// Returns the shared fields.
    fn base(&self) -> &BaseParameters;
}

/// A lifecycle payload reported in a phase where requests can be blocked.
pub trait BlockingEvent: LifecycleEvent {
    /// Phase this event reports.
    const PHASE: InterceptPhase;
}

macro_rules! lifecycle_event {
    ($ty:ty, $method:expr) => {
        impl LifecycleEvent for $ty {
            const METHOD: &'static str = $method;

            fn base(&self) -> &BaseParameters {
                &self.base
            }
        }
    };
    ($ty:ty, $method:expr, $phase:expr) => {
        lifecycle_event!($ty, $method);

        impl BlockingEvent for $ty {
            const PHASE: InterceptPhase = $phase;
        }
    };
}

lifecycle_event!(
    BeforeRequestSentParameters,
    BEFORE_REQUEST_SENT,
    InterceptPhase::BeforeRequestSent
);
lifecycle_event!(
    ResponseStartedParameters,
    RESPONSE_STARTED,
    InterceptPhase::ResponseStarted
);
lifecycle_event!(
    AuthRequiredParameters,
    AUTH_REQUIRED,
    InterceptPhase::AuthRequired
);
lifecycle_event!(ResponseCompletedParameters, RESPONSE_COMPLETED);
lifecycle_event!(FetchErrorParameters, FETCH_ERROR);

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Request about to be sent.
    BeforeRequestSent(BeforeRequestSentParameters),
    /// Response headers received.
    ResponseStarted(ResponseStartedParameters),
    /// Response body completed.
    ResponseCompleted(ResponseCompletedParameters),
    /// Server asked for credentials.
    AuthRequired(AuthRequiredParameters),
    /// Request failed.
    FetchError(FetchErrorParameters),
    /// Event without a typed payload.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================
