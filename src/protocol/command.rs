//! Command definitions organized by module.
//!
//! Commands follow the `module.methodName` format. Each module enum is
//! adjacently tagged so that serializing a command yields
//! `{ "method": ..., "params": ... }`; [`Command::to_parts`] splits that into
//! the pieces the broker frames.
//!
//! # Command Modules
//!
//! | Module | Commands |
//! |--------|----------|
//! | `network` | Intercepts and blocked-request decisions |
//! | `script` | Evaluation, function calls, preload scripts |
//! | `session` | Status, event subscriptions, end |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{ContextId, InterceptId, PreloadScriptId, RequestId};

use super::types::{
    AuthCredentials, BytesValue, ContinueWithAuthAction, CookieHeader, Header, InterceptPhase,
    LocalValue, ResultOwnership, SetCookieHeader, Target, UrlPattern,
};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by module.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Session module commands.
    Session(SessionCommand),
    /// Script module commands.
    Script(ScriptCommand),
    /// Network module commands.
    Network(NetworkCommand),
}

impl Command {
    /// Splits the command into its method name and params object.
    ///
    /// Commands without parameters produce an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if a parameter fails to serialize, or
    /// [`Error::Protocol`] if the serialized form has no method.
    pub fn to_parts(&self) -> Result<(String, Value)> {
        let Value::Object(mut object) = serde_json::to_value(self)? else {
            return Err(Error::protocol("command did not serialize to an object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::protocol("command serialized without a method")),
        };
        let params = match object.remove("params") {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(params) => params,
        };

        Ok((method, params))
    }
}

impl From<SessionCommand> for Command {
    fn from(command: SessionCommand) -> Self {
        Self::Session(command)
    }
}

impl From<ScriptCommand> for Command {
    fn from(command: ScriptCommand) -> Self {
        Self::Script(command)
    }
}

impl From<NetworkCommand> for Command {
    fn from(command: NetworkCommand) -> Self {
        Self::Network(command)
    }
}

// ============================================================================
// Session Commands
// ============================================================================

/// Session module commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum SessionCommand {
    /// Get remote end readiness.
    #[serde(rename = "session.status")]
    Status,

    /// Enable events on the remote end.
    #[serde(rename = "session.subscribe")]
    Subscribe {
        /// Event or module names.
        events: Vec<String>,
        /// Restrict to these browsing contexts.
        #[serde(skip_serializing_if = "Option::is_none")]
        contexts: Option<Vec<ContextId>>,
    },

    /// Disable events on the remote end.
    #[serde(rename = "session.unsubscribe")]
    Unsubscribe {
        /// Event or module names.
        events: Vec<String>,
        /// Restrict to these browsing contexts.
        #[serde(skip_serializing_if = "Option::is_none")]
        contexts: Option<Vec<ContextId>>,
    },

    /// End the session.
    #[serde(rename = "session.end")]
    End,
}

// ============================================================================
// Script Commands
// ============================================================================

/// Script module commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum ScriptCommand {
    /// Evaluate an expression.
    #[serde(rename = "script.evaluate")]
    Evaluate {
        /// JavaScript expression.
        expression: String,
        /// Realm or context to run in.
        target: Target,
        /// Wait for a returned promise to settle.
        await_promise: bool,
        /// Ownership of the returned value.
        #[serde(skip_serializing_if = "Option::is_none")]
        result_ownership: Option<ResultOwnership>,
    },

    /// Call a function declaration with arguments.
    #[serde(rename = "script.callFunction")]
    CallFunction {
        /// JavaScript function source.
        function_declaration: String,
        /// Wait for a returned promise to settle.
        await_promise: bool,
        /// Realm or context to run in.
        target: Target,
        /// Arguments.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<Vec<LocalValue>>,
        /// `this` binding.
        #[serde(rename = "this", skip_serializing_if = "Option::is_none")]
        this: Option<LocalValue>,
        /// Ownership of the returned value.
        #[serde(skip_serializing_if = "Option::is_none")]
        result_ownership: Option<ResultOwnership>,
    },

    /// Release handles held by the remote end.
    #[serde(rename = "script.disown")]
    Disown {
        /// Handles to release.
        handles: Vec<String>,
        /// Realm or context holding the handles.
        target: Target,
    },

    /// Install a script that runs before any page script.
    #[serde(rename = "script.addPreloadScript")]
    AddPreloadScript {
        /// JavaScript function source.
        function_declaration: String,
        /// Restrict to these top-level contexts.
        #[serde(skip_serializing_if = "Option::is_none")]
        contexts: Option<Vec<ContextId>>,
        /// Sandbox to run in.
        #[serde(skip_serializing_if = "Option::is_none")]
        sandbox: Option<String>,
    },

    /// Remove a preload script.
    #[serde(rename = "script.removePreloadScript")]
    RemovePreloadScript {
        /// Preload script id.
        script: PreloadScriptId,
    },
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network module commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum NetworkCommand {
    /// Add a network intercept.
    #[serde(rename = "network.addIntercept")]
    AddIntercept {
        /// Phases to block in.
        phases: Vec<InterceptPhase>,
        /// Restrict to these top-level contexts.
        #[serde(skip_serializing_if = "Option::is_none")]
        contexts: Option<Vec<ContextId>>,
        /// Restrict to matching URLs.
        #[serde(skip_serializing_if = "Option::is_none")]
        url_patterns: Option<Vec<UrlPattern>>,
    },

    /// Remove a network intercept.
    #[serde(rename = "network.removeIntercept")]
    RemoveIntercept {
        /// Intercept id.
        intercept: InterceptId,
    },

    /// Let a blocked request proceed, optionally modified.
    #[serde(rename = "network.continueRequest")]
    ContinueRequest(ContinueRequestParameters),

    /// Fail a blocked request with a network error.
    #[serde(rename = "network.failRequest")]
    FailRequest {
        /// Request id.
        request: RequestId,
    },

    /// Answer a blocked request with a synthetic response.
    #[serde(rename = "network.provideResponse")]
    ProvideResponse(ProvideResponseParameters),

    /// Let a blocked response proceed, optionally modified.
    #[serde(rename = "network.continueResponse")]
    ContinueResponse(ContinueResponseParameters),

    /// Resolve an authentication challenge.
    #[serde(rename = "network.continueWithAuth")]
    ContinueWithAuth {
        /// Request id.
        request: RequestId,
        /// What to do with the challenge.
        action: ContinueWithAuthAction,
        /// Credentials, only with `provideCredentials`.
        #[serde(skip_serializing_if = "Option::is_none")]
        credentials: Option<AuthCredentials>,
    },
}

/// Params of `network.continueRequest`.
#[derive(Debug, Clone, Serialize)]
pub struct ContinueRequestParameters {
    /// Request id.
    pub request: RequestId,
    /// Modifications.
    #[serde(flatten)]
    pub overrides: RequestOverrides,
}

/// Params of `network.provideResponse`.
#[derive(Debug, Clone, Serialize)]
pub struct ProvideResponseParameters {
    /// Request id.
    pub request: RequestId,
    /// The response to serve.
    #[serde(flatten)]
    pub response: SyntheticResponse,
}

/// Params of `network.continueResponse`.
#[derive(Debug, Clone, Serialize)]
pub struct ContinueResponseParameters {
    /// Request id.
    pub request: RequestId,
    /// Modifications.
    #[serde(flatten)]
    pub overrides: ResponseOverrides,
}

// ============================================================================
// RequestOverrides
// ============================================================================

/// Modifications applied when continuing a request. Empty means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestOverrides {
    /// Replacement body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BytesValue>,
    /// Replacement `Cookie` header entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<CookieHeader>>,
    /// Replacement headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    /// Replacement HTTP method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Replacement URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RequestOverrides {
    /// Creates empty overrides.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<BytesValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: CookieHeader) -> Self {
        self.cookies.get_or_insert_with(Vec::new).push(cookie);
        self
    }

    /// Adds a header. The first call replaces the whole header list.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push(Header::new(name, value));
        self
    }

    /// Replaces the HTTP method.
    #[inline]
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Replaces the URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

// ============================================================================
// ResponseOverrides
// ============================================================================

/// Modifications applied when continuing a response. Empty means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOverrides {
    /// Replacement `Set-Cookie` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<SetCookieHeader>>,
    /// Credentials answering an auth challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<AuthCredentials>,
    /// Replacement headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    /// Replacement status text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
    /// Replacement status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ResponseOverrides {
    /// Creates empty overrides.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `Set-Cookie` entry.
    #[must_use]
    pub fn with_cookie(mut self, cookie: SetCookieHeader) -> Self {
        self.cookies.get_or_insert_with(Vec::new).push(cookie);
        self
    }

    /// Supplies credentials.
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, credentials: AuthCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Adds a header. The first call replaces the whole header list.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push(Header::new(name, value));
        self
    }

    /// Replaces the status text.
    #[inline]
    #[must_use]
    pub fn with_reason_phrase(mut self, reason: impl Into<String>) -> Self {
        self.reason_phrase = Some(reason.into());
        self
    }

    /// Replaces the status code.
    #[inline]
    #[must_use]
    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

// ============================================================================
// SyntheticResponse
// ============================================================================

/// A response served in place of the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticResponse {
    /// Response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BytesValue>,
    /// `Set-Cookie` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<SetCookieHeader>>,
    /// Headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    /// Status text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
    /// Status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl SyntheticResponse {
    /// Creates a response with the given status code.
    #[inline]
    #[must_use]
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::default()
        }
    }

    /// Sets the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<BytesValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a `Set-Cookie` entry.
    #[must_use]
    pub fn with_cookie(mut self, cookie: SetCookieHeader) -> Self {
        self.cookies.get_or_insert_with(Vec::new).push(cookie);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push(Header::new(name, value));
        self
    }

    /// Sets the status text.
    #[inline]
    #[must_use]
    pub fn with_reason_phrase(mut self, reason: impl Into<String>) -> Self {
        self.reason_phrase = Some(reason.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::types::UrlPatternPattern;

    fn parts(command: impl Into<Command>) -> (String, Value) {
        command.into().to_parts().expect("serialize")
    }

    #[test]
    fn test_unit_command_has_empty_params() {
        let (method, params) = parts(SessionCommand::Status);
        assert_eq!(method, "session.status");
        assert_eq!(params, json!({}));
    }

    #[test]
    fn test_add_intercept() {
        let (method, params) = parts(NetworkCommand::AddIntercept {
            phases: vec![InterceptPhase::BeforeRequestSent],
            contexts: None,
            url_patterns: Some(vec![
                UrlPatternPattern::default().with_hostname("example.com").into(),
            ]),
        });
        assert_eq!(method, "network.addIntercept");
        assert_eq!(
            params,
            json!({
                "phases": ["beforeRequestSent"],
                "urlPatterns": [{ "type": "pattern", "hostname": "example.com" }]
            })
        );
    }

    #[test]
    fn test_continue_request_default_is_request_only() {
        let (method, params) = parts(NetworkCommand::ContinueRequest(ContinueRequestParameters {
            request: RequestId::new("r1"),
            overrides: RequestOverrides::default(),
        }));
        assert_eq!(method, "network.continueRequest");
        assert_eq!(params, json!({ "request": "r1" }));
    }

    #[test]
    fn test_continue_request_overrides() {
        let (_, params) = parts(NetworkCommand::ContinueRequest(ContinueRequestParameters {
            request: RequestId::new("r1"),
            overrides: RequestOverrides::new()
                .with_method("POST")
                .with_header("x-test", "1")
                .with_body("payload"),
        }));
        assert_eq!(
            params,
            json!({
                "request": "r1",
                "method": "POST",
                "headers": [{ "name": "x-test", "value": { "type": "string", "value": "1" } }],
                "body": { "type": "string", "value": "payload" }
            })
        );
    }

    #[test]
    fn test_provide_response() {
        let (method, params) = parts(NetworkCommand::ProvideResponse(ProvideResponseParameters {
            request: RequestId::new("r2"),
            response: SyntheticResponse::new(404).with_reason_phrase("Not Found"),
        }));
        assert_eq!(method, "network.provideResponse");
        assert_eq!(
            params,
            json!({ "request": "r2", "statusCode": 404, "reasonPhrase": "Not Found" })
        );
    }

    #[test]
    fn test_continue_with_auth_cancel_omits_credentials() {
        let (method, params) = parts(NetworkCommand::ContinueWithAuth {
            request: RequestId::new("r3"),
            action: ContinueWithAuthAction::Cancel,
            credentials: None,
        });
        assert_eq!(method, "network.continueWithAuth");
        assert_eq!(params, json!({ "request": "r3", "action": "cancel" }));
    }

    #[test]
    fn test_continue_with_auth_credentials() {
        let (_, params) = parts(NetworkCommand::ContinueWithAuth {
            request: RequestId::new("r3"),
            action: ContinueWithAuthAction::ProvideCredentials,
            credentials: Some(AuthCredentials::basic("user", "pass")),
        });
        assert_eq!(
            params,
            json!({
                "request": "r3",
                "action": "provideCredentials",
                "credentials": { "type": "password", "username": "user", "password": "pass" }
            })
        );
    }

    #[test]
    fn test_call_function_field_names() {
        let (method, params) = parts(ScriptCommand::CallFunction {
            function_declaration: "(a) => a".into(),
            await_promise: false,
            target: Target::context("ctx"),
            arguments: Some(vec![LocalValue::Boolean(true)]),
            this: None,
            result_ownership: Some(ResultOwnership::Root),
        });
        assert_eq!(method, "script.callFunction");
        assert_eq!(
            params,
            json!({
                "functionDeclaration": "(a) => a",
                "awaitPromise": false,
                "target": { "context": "ctx" },
                "arguments": [{ "type": "boolean", "value": true }],
                "resultOwnership": "root"
            })
        );
    }

    #[test]
    fn test_subscribe() {
        let (method, params) = parts(SessionCommand::Subscribe {
            events: vec!["network.beforeRequestSent".into()],
            contexts: None,
        });
        assert_eq!(method, "session.subscribe");
        assert_eq!(params, json!({ "events": ["network.beforeRequestSent"] }));
    }
}
