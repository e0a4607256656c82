//! Network records shared by commands and lifecycle events.
//!
//! These are plain records rather than polymorphic families; their
//! polymorphic fields (`BytesValue`) delegate to the codec.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::RequestId;

use super::BytesValue;

// ============================================================================
// InterceptPhase
// ============================================================================

/// A network lifecycle phase at which requests can be blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterceptPhase {
    /// Before the request is sent.
    BeforeRequestSent,
    /// After response headers are received.
    ResponseStarted,
    /// When the server asks for credentials.
    AuthRequired,
}

impl InterceptPhase {
    /// Returns the wire name of the phase.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeRequestSent => "beforeRequestSent",
            Self::ResponseStarted => "responseStarted",
            Self::AuthRequired => "authRequired",
        }
    }

    /// Returns the event method reporting requests blocked in this phase.
    #[inline]
    #[must_use]
    pub const fn event_method(&self) -> &'static str {
        match self {
            Self::BeforeRequestSent => "network.beforeRequestSent",
            Self::ResponseStarted => "network.responseStarted",
            Self::AuthRequired => "network.authRequired",
        }
    }
}

impl fmt::Display for InterceptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Headers and Cookies
// ============================================================================

/// An HTTP header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: BytesValue,
}

impl Header {
    /// Creates a header with a text value.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: BytesValue::string(value),
        }
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// `Strict`.
    Strict,
    /// `Lax`.
    Lax,
    /// `None`.
    None,
}

/// A cookie as reported on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: BytesValue,
    /// Domain attribute.
    #[serde(default)]
    pub domain: String,
    /// Path attribute.
    #[serde(default)]
    pub path: String,
    /// Serialized size in bytes.
    #[serde(default)]
    pub size: u64,
    /// `HttpOnly` attribute.
    #[serde(default)]
    pub http_only: bool,
    /// `Secure` attribute.
    #[serde(default)]
    pub secure: bool,
    /// `SameSite` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
    /// Expiry in seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
}

/// A cookie to send with a continued request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieHeader {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: BytesValue,
}

impl CookieHeader {
    /// Creates a cookie with a text value.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: BytesValue::string(value),
        }
    }
}

/// A `Set-Cookie` entry for a synthesized or continued response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCookieHeader {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: BytesValue,
    /// Domain attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// `HttpOnly` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    /// `Expires` attribute, as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// `Max-Age` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    /// Path attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `SameSite` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
    /// `Secure` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

impl SetCookieHeader {
    /// Creates a cookie with only a name and text value.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: BytesValue::string(value),
            domain: None,
            http_only: None,
            expiry: None,
            max_age: None,
            path: None,
            same_site: None,
            secure: None,
        }
    }
}

// ============================================================================
// Request and Response Data
// ============================================================================

/// Timing of a fetch, in milliseconds relative to `time_origin`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchTimingInfo {
    pub time_origin: f64,
    pub request_time: f64,
    pub redirect_start: f64,
    pub redirect_end: f64,
    pub fetch_start: f64,
    pub dns_start: f64,
    pub dns_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub tls_start: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
}

/// The request half of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// Request id.
    pub request: RequestId,
    /// Request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Request cookies.
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Size of the serialized headers.
    #[serde(default)]
    pub headers_size: u64,
    /// Size of the body, if known.
    #[serde(default)]
    pub body_size: Option<u64>,
    /// Fetch timings.
    #[serde(default)]
    pub timings: FetchTimingInfo,
}

impl RequestData {
    /// Returns the first header with `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&BytesValue> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| &h.value)
    }
}

/// Who started a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    /// Initiator type (`parser`, `script`, `preflight`, `other`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub initiator_type: Option<String>,
    /// Column of the initiating script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u64>,
    /// Line of the initiating script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u64>,
    /// Request id of the preflight, for CORS requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestId>,
}

/// Decoded body size information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContent {
    /// Decoded body size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// An authentication challenge from a `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    /// Scheme, e.g. `Basic`.
    pub scheme: String,
    /// Realm.
    pub realm: String,
}

/// The response half of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// Response URL.
    pub url: String,
    /// Protocol, e.g. `http/1.1`.
    #[serde(default)]
    pub protocol: String,
    /// HTTP status code.
    pub status: u16,
    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,
    /// Whether the response came from cache.
    #[serde(default)]
    pub from_cache: bool,
    /// Response headers.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Bytes received over the network.
    #[serde(default)]
    pub bytes_received: u64,
    /// Size of the serialized headers.
    #[serde(default)]
    pub headers_size: Option<u64>,
    /// Size of the encoded body.
    #[serde(default)]
    pub body_size: Option<u64>,
    /// Decoded body information.
    #[serde(default)]
    pub content: ResponseContent,
    /// Authentication challenges, for 401/407 responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_challenges: Option<Vec<AuthChallenge>>,
}

// ============================================================================
// ContinueWithAuthAction
// ============================================================================

/// The `action` field of `network.continueWithAuth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContinueWithAuthAction {
    /// Answer the challenge with the supplied credentials.
    ProvideCredentials,
    /// Let the browser handle the challenge as it normally would.
    Default,
    /// Cancel the authentication attempt.
    Cancel,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(
            serde_json::to_value(InterceptPhase::BeforeRequestSent).expect("serialize"),
            json!("beforeRequestSent")
        );
        assert_eq!(InterceptPhase::AuthRequired.to_string(), "authRequired");
        assert_eq!(
            InterceptPhase::ResponseStarted.event_method(),
            "network.responseStarted"
        );
    }

    #[test]
    fn test_auth_action_wire_names() {
        assert_eq!(
            serde_json::to_value(ContinueWithAuthAction::ProvideCredentials).expect("serialize"),
            json!("provideCredentials")
        );
        assert_eq!(
            serde_json::to_value(ContinueWithAuthAction::Cancel).expect("serialize"),
            json!("cancel")
        );
    }

    #[test]
    fn test_request_data_is_lenient() {
        let data: RequestData = serde_json::from_value(json!({
            "request": "req-1",
            "url": "https://example.com/",
            "method": "GET",
            "headers": [{ "name": "Accept", "value": { "type": "string", "value": "*/*" } }]
        }))
        .expect("parse");

        assert_eq!(data.request, RequestId::new("req-1"));
        assert_eq!(data.header("accept"), Some(&BytesValue::string("*/*")));
        assert!(data.cookies.is_empty());
    }

    #[test]
    fn test_set_cookie_skips_unset_attributes() {
        let cookie = SetCookieHeader::new("sid", "abc");
        assert_eq!(
            serde_json::to_value(&cookie).expect("serialize"),
            json!({ "name": "sid", "value": { "type": "string", "value": "abc" } })
        );
    }

    #[test]
    fn test_response_data_with_challenges() {
        let data: ResponseData = serde_json::from_value(json!({
            "url": "https://example.com/",
            "status": 401,
            "authChallenges": [{ "scheme": "Basic", "realm": "admin" }]
        }))
        .expect("parse");

        assert_eq!(data.status, 401);
        assert_eq!(
            data.auth_challenges.as_deref(),
            Some(&[AuthChallenge { scheme: "Basic".into(), realm: "admin".into() }][..])
        );
    }
}
