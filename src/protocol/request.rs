//! Request, Response and inbound message classification.
//!
//! Outgoing frames carry a session-unique numeric id. Inbound frames are
//! either a response (non-null `id`) or an event (`method`, no `id`):
//!
//! ```json
//! { "id": 7, "method": "network.failRequest", "params": { "request": "r1" } }
//! { "id": 7, "type": "success", "result": {} }
//! { "id": 7, "type": "error", "error": "no such request", "message": "..." }
//! { "type": "event", "method": "network.beforeRequestSent", "params": { ... } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

use super::event::Event;

// ============================================================================
// Request
// ============================================================================

/// A command frame sent to the remote end.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation id.
    pub id: CommandId,

    /// Method in `module.methodName` format.
    pub method: String,

    /// Method parameters, always an object.
    pub params: Value,
}

impl Request {
    /// Creates a request frame.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serializes the frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Response
// ============================================================================

/// A command response from the remote end.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: CommandId,

    /// Optional `success` / `error` marker.
    #[serde(rename = "type", default)]
    pub response_type: Option<ResponseType>,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error code (if error).
    #[serde(default)]
    pub error: Option<String>,

    /// Error message (if error).
    #[serde(default)]
    pub message: Option<String>,

    /// Remote stack trace (if error).
    #[serde(default)]
    pub stacktrace: Option<String>,
}

impl Response {
    /// Returns `true` if this is an error response.
    ///
    /// The `error` field decides; the `type` marker is optional on the wire.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.response_type == Some(ResponseType::Error)
    }

    /// Extracts the result value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the response was an error.
    pub fn into_result(self) -> Result<Value> {
        if self.is_error() {
            let code = self.error.unwrap_or_else(|| "unknown error".to_string());
            let message = self.message.unwrap_or_else(|| code.clone());
            return Err(Error::remote(code, message, self.stacktrace));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Message
// ============================================================================

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum Message {
    /// Response to a command.
    Response(Response),
    /// Event notification.
    Event(Event),
    /// Frame carrying a command id whose body is not a valid response.
    ///
    /// The command it answers must fail with [`Error::Protocol`].
    Malformed {
        /// Id of the command the frame answers.
        id: CommandId,
        /// Why the body was rejected.
        reason: String,
    },
}

impl Message {
    /// Parses and classifies one inbound text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::Protocol`] if the frame is neither a response nor an event,
    ///   or is an error frame not tied to any command
    ///
    /// A frame with a numeric `id` but a malformed body is not an error here;
    /// it classifies as [`Message::Malformed`] so the command can be failed.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::classify(value)
    }

    /// Classifies a parsed frame.
    ///
    /// # Errors
    ///
    /// See [`Message::parse`].
    pub fn classify(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(Error::protocol(format!("frame is not an object: {value}")));
        };

        match object.get("id") {
            Some(Value::Null) | None => {}
            Some(id) => {
                let id = id.as_u64().map(CommandId::new);
                return match (serde_json::from_value::<Response>(value.clone()), id) {
                    (Ok(response), _) => Ok(Self::Response(response)),
                    (Err(e), Some(id)) => Ok(Self::Malformed {
                        id,
                        reason: e.to_string(),
                    }),
                    (Err(e), None) => Err(Error::protocol(format!("malformed response: {e}"))),
                };
            }
        }

        if let Some(code) = object.get("error") {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(Error::protocol(format!(
                "error without command id: {code}: {message}"
            )));
        }

        if object.get("method").is_some_and(Value::is_string) {
            let event: Event = serde_json::from_value(value)
                .map_err(|e| Error::protocol(format!("malformed event: {e}")))?;
            return Ok(Self::Event(event));
        }

        Err(Error::protocol(format!(
            "frame is neither a response nor an event: {value}"
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(
            CommandId::new(3),
            "network.failRequest",
            json!({ "request": "r1" }),
        );
        let value: Value = serde_json::from_str(&request.to_text().expect("text")).expect("json");
        assert_eq!(
            value,
            json!({ "id": 3, "method": "network.failRequest", "params": { "request": "r1" } })
        );
    }

    #[test]
    fn test_success_response_without_type() {
        let message = Message::parse(r#"{ "id": 1, "result": { "ready": true } }"#).expect("parse");
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        assert_eq!(response.id, CommandId::new(1));
        assert_eq!(response.into_result().expect("ok"), json!({ "ready": true }));
    }

    #[test]
    fn test_error_response() {
        let message = Message::parse(
            r#"{
                "id": 2,
                "type": "error",
                "error": "no such request",
                "message": "Blocked request with id r9 not found",
                "stacktrace": "at handler"
            }"#,
        )
        .expect("parse");
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        assert!(response.is_error());

        match response.into_result().unwrap_err() {
            Error::Remote {
                code,
                message,
                stacktrace,
            } => {
                assert_eq!(code, "no such request");
                assert!(message.contains("r9"));
                assert_eq!(stacktrace.as_deref(), Some("at handler"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_without_type_marker() {
        let message = Message::parse(r#"{ "id": 4, "error": "unknown error" }"#).expect("parse");
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        assert!(response.into_result().is_err());
    }

    #[test]
    fn test_malformed_response_keeps_id() {
        let message = Message::parse(r#"{ "id": 5, "error": 5 }"#).expect("parse");
        match message {
            Message::Malformed { id, reason } => {
                assert_eq!(id, CommandId::new(5));
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }

        // Without a usable id there is nothing to fail
        let err = Message::parse(r#"{ "id": "five", "result": {} }"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_event_classification() {
        let message = Message::parse(
            r#"{ "type": "event", "method": "network.fetchError", "params": { "x": 1 } }"#,
        )
        .expect("parse");
        assert!(matches!(message, Message::Event(event) if event.method == "network.fetchError"));
    }

    #[test]
    fn test_error_with_null_id_is_protocol_error() {
        let err = Message::parse(r#"{ "id": null, "error": "invalid argument", "message": "bad" }"#)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_unclassifiable_frame() {
        let err = Message::parse(r#"{ "foo": 1 }"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));

        let err = Message::parse("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = Message::parse("{ not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
