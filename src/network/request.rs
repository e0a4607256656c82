//! Blocked requests and their decisions.
//!
//! A [`BlockedRequest`] is handed to intercept handlers for every lifecycle
//! event that reports the request as blocked. It accepts exactly one
//! terminal decision:
//!
//! | Decision | Allowed phases | Command |
//! |----------|----------------|---------|
//! | [`BlockedRequest::continue_request`] | `beforeRequestSent` | `network.continueRequest` |
//! | [`BlockedRequest::fail`] | all | `network.failRequest` |
//! | [`BlockedRequest::provide_response`] | all | `network.provideResponse` |
//! | [`BlockedRequest::continue_response`] | `responseStarted`, `authRequired` | `network.continueResponse` |
//! | [`BlockedRequest::continue_with_auth`] | `authRequired` | `network.continueWithAuth` |
//!
//! Every handle built from the same inbound message shares one decision, so
//! when several intercepts block a request the first decision wins. A
//! decision the broker refuses before sending it (for instance
//! [`Error::TooManyPendingCommands`]) leaves the request blocked.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde_json::Value;
use tracing::debug;

use crate::broker::Broker;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::types::{AuthCredentials, ContinueWithAuthAction, InterceptPhase};
use crate::protocol::{
    ContinueRequestParameters, ContinueResponseParameters, NetworkCommand,
    ProvideResponseParameters, RequestOverrides, ResponseOverrides, SyntheticResponse,
};

// ============================================================================
// RequestState
// ============================================================================

/// Decision state of one blocked occurrence of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestState {
    /// Awaiting a decision.
    Blocked = 0,
    /// `network.continueRequest` was sent.
    Continued = 1,
    /// `network.failRequest` was sent.
    Failed = 2,
    /// `network.provideResponse` was sent.
    ResponseProvided = 3,
    /// `network.continueResponse` was sent.
    ResponseContinued = 4,
    /// Credentials were supplied.
    AuthContinued = 5,
    /// The browser's default auth behavior was requested.
    AuthDefaulted = 6,
    /// The auth challenge was cancelled.
    AuthCancelled = 7,
}

impl RequestState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Continued,
            2 => Self::Failed,
            3 => Self::ResponseProvided,
            4 => Self::ResponseContinued,
            5 => Self::AuthContinued,
            6 => Self::AuthDefaulted,
            7 => Self::AuthCancelled,
            _ => Self::Blocked,
        }
    }

    /// Returns `true` for every state but [`RequestState::Blocked`].
    #[inline]
    #[must_use]
    pub const fn is_decided(&self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

// ============================================================================
// DecisionSlot
// ============================================================================

/// Shared decision cell for one inbound lifecycle message.
#[derive(Debug, Clone, Default)]
pub(crate) struct DecisionSlot(Arc<AtomicU8>);

impl DecisionSlot {
    /// Returns the current state.
    #[inline]
    pub(crate) fn state(&self) -> RequestState {
        RequestState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `Blocked` to `next`. Returns `false` if already decided.
    #[inline]
    pub(crate) fn claim(&self, next: RequestState) -> bool {
        self.0
            .compare_exchange(
                RequestState::Blocked as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves from `claimed` back to `Blocked`. Returns `false` if the state
    /// is no longer `claimed`.
    #[inline]
    pub(crate) fn release(&self, claimed: RequestState) -> bool {
        self.0
            .compare_exchange(
                claimed as u8,
                RequestState::Blocked as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

// ============================================================================
// AuthDecision
// ============================================================================

/// How to answer an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Supply credentials.
    Credentials(AuthCredentials),
    /// Let the browser apply its default behavior (usually a prompt).
    Default,
    /// Cancel the challenge; the response proceeds unauthenticated.
    Cancel,
}

impl AuthDecision {
    /// Supplies basic credentials.
    #[inline]
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Credentials(AuthCredentials::basic(username, password))
    }

    fn into_parts(self) -> (ContinueWithAuthAction, Option<AuthCredentials>, RequestState) {
        match self {
            Self::Credentials(credentials) => (
                ContinueWithAuthAction::ProvideCredentials,
                Some(credentials),
                RequestState::AuthContinued,
            ),
            Self::Default => (
                ContinueWithAuthAction::Default,
                None,
                RequestState::AuthDefaulted,
            ),
            Self::Cancel => (ContinueWithAuthAction::Cancel, None, RequestState::AuthCancelled),
        }
    }
}

// ============================================================================
// BlockedRequest
// ============================================================================

/// A request blocked by one or more intercepts.
///
/// Cloning shares the decision.
#[derive(Clone)]
pub struct BlockedRequest {
    id: RequestId,
    phase: InterceptPhase,
    broker: Broker,
    slot: DecisionSlot,
}

impl fmt::Debug for BlockedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockedRequest")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("state", &self.state())
            .finish()
    }
}

impl BlockedRequest {
    pub(crate) fn new(
        id: RequestId,
        phase: InterceptPhase,
        broker: Broker,
        slot: DecisionSlot,
    ) -> Self {
        Self {
            id,
            phase,
            broker,
            slot,
        }
    }

    /// Returns the request id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Returns the phase the request is blocked in.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> InterceptPhase {
        self.phase
    }

    /// Returns the decision state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.slot.state()
    }

    /// Returns `true` once a decision was made.
    #[inline]
    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.state().is_decided()
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Lets the request proceed, optionally modified.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyDecided`] if a decision was already made
    /// - [`Error::InvalidPhase`] outside `beforeRequestSent`
    /// - Any error of [`Broker::send`]
    pub async fn continue_request(&self, overrides: RequestOverrides) -> Result<()> {
        self.claim(
            "continue_request",
            &[InterceptPhase::BeforeRequestSent],
            RequestState::Continued,
        )?;
        self.send(
            NetworkCommand::ContinueRequest(ContinueRequestParameters {
                request: self.id.clone(),
                overrides,
            }),
            RequestState::Continued,
        )
        .await
    }

    /// Fails the request with a network error.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyDecided`] if a decision was already made
    /// - Any error of [`Broker::send`]
    pub async fn fail(&self) -> Result<()> {
        self.claim("fail", ALL_PHASES, RequestState::Failed)?;
        self.send(
            NetworkCommand::FailRequest {
                request: self.id.clone(),
            },
            RequestState::Failed,
        )
        .await
    }

    /// Answers the request with a synthetic response.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyDecided`] if a decision was already made
    /// - Any error of [`Broker::send`]
    pub async fn provide_response(&self, response: SyntheticResponse) -> Result<()> {
        self.claim("provide_response", ALL_PHASES, RequestState::ResponseProvided)?;
        self.send(
            NetworkCommand::ProvideResponse(ProvideResponseParameters {
                request: self.id.clone(),
                response,
            }),
            RequestState::ResponseProvided,
        )
        .await
    }

    /// Lets the response proceed, optionally modified.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyDecided`] if a decision was already made
    /// - [`Error::InvalidPhase`] in `beforeRequestSent`
    /// - Any error of [`Broker::send`]
    pub async fn continue_response(&self, overrides: ResponseOverrides) -> Result<()> {
        self.claim(
            "continue_response",
            &[InterceptPhase::ResponseStarted, InterceptPhase::AuthRequired],
            RequestState::ResponseContinued,
        )?;
        self.send(
            NetworkCommand::ContinueResponse(ContinueResponseParameters {
                request: self.id.clone(),
                overrides,
            }),
            RequestState::ResponseContinued,
        )
        .await
    }

    /// Resolves an authentication challenge.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyDecided`] if a decision was already made
    /// - [`Error::InvalidPhase`] outside `authRequired`
    /// - Any error of [`Broker::send`]
    pub async fn continue_with_auth(&self, decision: AuthDecision) -> Result<()> {
        let (action, credentials, next) = decision.into_parts();
        self.claim("continue_with_auth", &[InterceptPhase::AuthRequired], next)?;
        self.send(
            NetworkCommand::ContinueWithAuth {
                request: self.id.clone(),
                action,
                credentials,
            },
            next,
        )
        .await
    }

    /// Checks the phase and claims the decision.
    ///
    /// A phase error leaves the request blocked.
    fn claim(
        &self,
        decision: &'static str,
        allowed: &[InterceptPhase],
        next: RequestState,
    ) -> Result<()> {
        if self.is_decided() {
            return Err(Error::already_decided(self.id.clone()));
        }
        if !allowed.contains(&self.phase) {
            return Err(Error::invalid_phase(self.id.clone(), self.phase, decision));
        }
        if !self.slot.claim(next) {
            return Err(Error::already_decided(self.id.clone()));
        }
        debug!(request = %self.id, phase = %self.phase, ?next, "Request decided");
        Ok(())
    }

    /// Sends the decision command.
    ///
    /// If the command never reached the transport the request is blocked
    /// again and another decision may be made. Any later failure keeps the
    /// decision, since the remote end may have applied it.
    async fn send(&self, command: NetworkCommand, claimed: RequestState) -> Result<()> {
        match self.broker.send::<Value>(command).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(e, Error::TooManyPendingCommands { .. } | Error::Json(_))
                    && self.slot.release(claimed)
                {
                    debug!(request = %self.id, error = %e, "Decision not sent, request blocked again");
                }
                Err(e)
            }
        }
    }
}

const ALL_PHASES: &[InterceptPhase] = &[
    InterceptPhase::BeforeRequestSent,
    InterceptPhase::ResponseStarted,
    InterceptPhase::AuthRequired,
];

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::session::SessionOptions;
    use crate::transport::{ChannelTransport, RemoteEnd};

    fn blocked(phase: InterceptPhase) -> (BlockedRequest, RemoteEnd) {
        blocked_with(phase, SessionOptions::new())
    }

    fn blocked_with(phase: InterceptPhase, options: SessionOptions) -> (BlockedRequest, RemoteEnd) {
        let (transport, _inbound, remote) = ChannelTransport::pair();
        let broker = Broker::new(Arc::new(transport), options);
        let request = BlockedRequest::new(
            RequestId::new("req-1"),
            phase,
            broker,
            DecisionSlot::default(),
        );
        (request, remote)
    }

    /// Answers the next command with an empty result and returns its frame.
    async fn answer(request: &BlockedRequest, remote: &mut RemoteEnd) -> Value {
        let frame = remote.recv_json().await.expect("frame");
        let reply = json!({ "id": frame["id"], "result": {} });
        request.broker.on_message(&reply.to_string()).expect("response");
        frame
    }

    #[test]
    fn test_slot_claims_once() {
        let slot = DecisionSlot::default();
        let shared = slot.clone();
        assert_eq!(slot.state(), RequestState::Blocked);
        assert!(slot.claim(RequestState::Failed));
        assert!(!shared.claim(RequestState::Continued));
        assert_eq!(shared.state(), RequestState::Failed);

        assert!(!shared.release(RequestState::Continued));
        assert!(shared.release(RequestState::Failed));
        assert_eq!(slot.state(), RequestState::Blocked);
    }

    #[tokio::test]
    async fn test_continue_request_default() {
        let (request, mut remote) = blocked(InterceptPhase::BeforeRequestSent);

        let (result, frame) = tokio::join!(
            request.continue_request(RequestOverrides::default()),
            answer(&request, &mut remote)
        );
        result.expect("continue");

        assert_eq!(frame["method"], "network.continueRequest");
        assert_eq!(frame["params"], json!({ "request": "req-1" }));
        assert_eq!(request.state(), RequestState::Continued);
    }

    #[tokio::test]
    async fn test_second_decision_sends_nothing() {
        let (request, mut remote) = blocked(InterceptPhase::BeforeRequestSent);

        let (result, _) = tokio::join!(request.fail(), answer(&request, &mut remote));
        result.expect("fail");

        let err = request
            .continue_request(RequestOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyDecided { .. }));
        assert!(err.is_caller_error());
        assert!(remote.try_recv().is_none());
        assert_eq!(request.state(), RequestState::Failed);
    }

    #[tokio::test]
    async fn test_wrong_phase_stays_blocked() {
        let (request, mut remote) = blocked(InterceptPhase::BeforeRequestSent);

        let err = request
            .continue_with_auth(AuthDecision::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPhase { decision: "continue_with_auth", .. }
        ));
        assert!(remote.try_recv().is_none());
        assert_eq!(request.state(), RequestState::Blocked);

        let err = request
            .continue_response(ResponseOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPhase { .. }));
        assert!(!request.is_decided());
    }

    #[tokio::test]
    async fn test_auth_cancel_omits_credentials() {
        let (request, mut remote) = blocked(InterceptPhase::AuthRequired);

        let (result, frame) = tokio::join!(
            request.continue_with_auth(AuthDecision::Cancel),
            answer(&request, &mut remote)
        );
        result.expect("cancel");

        assert_eq!(frame["method"], "network.continueWithAuth");
        assert_eq!(frame["params"], json!({ "request": "req-1", "action": "cancel" }));
        assert_eq!(request.state(), RequestState::AuthCancelled);
    }

    #[tokio::test]
    async fn test_auth_credentials() {
        let (request, mut remote) = blocked(InterceptPhase::AuthRequired);

        let (result, frame) = tokio::join!(
            request.continue_with_auth(AuthDecision::basic("alice", "secret")),
            answer(&request, &mut remote)
        );
        result.expect("credentials");

        assert_eq!(frame["params"]["action"], "provideCredentials");
        assert_eq!(frame["params"]["credentials"]["type"], "password");
        assert_eq!(frame["params"]["credentials"]["username"], "alice");
        assert_eq!(request.state(), RequestState::AuthContinued);
    }

    #[tokio::test]
    async fn test_provide_response_in_response_phase() {
        let (request, mut remote) = blocked(InterceptPhase::ResponseStarted);

        let (result, frame) = tokio::join!(
            request.provide_response(SyntheticResponse::new(204)),
            answer(&request, &mut remote)
        );
        result.expect("provide");

        assert_eq!(frame["method"], "network.provideResponse");
        assert_eq!(frame["params"]["statusCode"], 204);
    }

    #[tokio::test]
    async fn test_remote_error_keeps_decision() {
        let (request, mut remote) = blocked(InterceptPhase::ResponseStarted);

        let respond = async {
            let frame = remote.recv_json().await.expect("frame");
            let reply = json!({ "id": frame["id"], "error": "no such request", "message": "gone" });
            request.broker.on_message(&reply.to_string()).expect("response");
        };
        let (result, ()) = tokio::join!(
            request.continue_response(ResponseOverrides::new().with_status_code(500)),
            respond
        );

        assert!(matches!(result, Err(Error::Remote { .. })));
        assert_eq!(request.state(), RequestState::ResponseContinued);
    }

    #[tokio::test]
    async fn test_refused_send_keeps_request_blocked() {
        let (request, mut remote) =
            blocked_with(InterceptPhase::BeforeRequestSent, SessionOptions::new().with_max_pending(1));

        // Occupy the only in-flight slot
        let broker = request.broker.clone();
        let occupant = tokio::spawn(async move { broker.send_raw("session.status", json!({})).await });
        let pending = remote.recv_json().await.expect("frame");

        let err = request.fail().await.unwrap_err();
        assert!(matches!(err, Error::TooManyPendingCommands { pending: 1, max: 1 }));
        assert_eq!(request.state(), RequestState::Blocked);
        assert!(remote.try_recv().is_none());

        let reply = json!({ "id": pending["id"], "result": {} });
        request.broker.on_message(&reply.to_string()).expect("response");
        occupant.await.expect("join").expect("status");

        let (result, frame) = tokio::join!(request.fail(), answer(&request, &mut remote));
        result.expect("fail");
        assert_eq!(frame["method"], "network.failRequest");
        assert_eq!(request.state(), RequestState::Failed);
    }

    #[tokio::test]
    async fn test_clones_share_decision() {
        let (request, mut remote) = blocked(InterceptPhase::BeforeRequestSent);
        let other = request.clone();

        let (result, _) = tokio::join!(request.fail(), answer(&request, &mut remote));
        result.expect("fail");

        assert!(other.is_decided());
        assert!(matches!(other.fail().await, Err(Error::AlreadyDecided { .. })));
    }
}
