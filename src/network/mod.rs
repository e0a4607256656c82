//! Network domain facade.
//!
//! # Example
//!
//! ```no_run
//! use webdriver_bidi::{RequestOverrides, Result, Session, UrlPattern};
//!
//! # async fn example(session: &Session) -> Result<()> {
//! let network = session.network();
//! let intercept = network
//!     .intercept_requests(vec![UrlPattern::string("https://example.com/api/")], |params, request| async move {
//!         println!("{} {}", params.base.request.method, params.base.request.url);
//!         request.continue_request(RequestOverrides::default()).await
//!     })
//!     .await?;
//!
//! // ...
//!
//! intercept.remove().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::broker::{Broker, EventHandler, Subscription};
use crate::error::{Error, Result};
use crate::identifiers::{ContextId, InterceptId};
use crate::protocol::types::{InterceptPhase, UrlPattern};
use crate::protocol::{
    AuthRequiredParameters, BeforeRequestSentParameters, BlockingEvent, FetchErrorParameters,
    LifecycleEvent, NetworkCommand, ResponseCompletedParameters, ResponseStartedParameters,
};

// ============================================================================
// Submodules
// ============================================================================

/// Intercept registrations.
pub mod intercept;

/// Blocked requests and their decisions.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use intercept::Intercept;
pub use request::{AuthDecision, BlockedRequest, RequestState};

use intercept::EarlyHandler;

// ============================================================================
// InterceptOptions
// ============================================================================

/// Parameters of `network.addIntercept`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptOptions {
    /// Phases to block in. Must not be empty.
    pub phases: Vec<InterceptPhase>,
    /// Restrict to these top-level contexts.
    pub contexts: Option<Vec<ContextId>>,
    /// Restrict to matching URLs.
    pub url_patterns: Option<Vec<UrlPattern>>,
}

impl InterceptOptions {
    /// Blocks in `phases`, for every context and URL.
    #[must_use]
    pub fn new(phases: impl IntoIterator<Item = InterceptPhase>) -> Self {
        Self {
            phases: phases.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds a top-level context to the scope.
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<ContextId>) -> Self {
        self.contexts.get_or_insert_with(Vec::new).push(context.into());
        self
    }

    /// Adds a URL pattern to the scope.
    #[inline]
    #[must_use]
    pub fn with_url_pattern(mut self, pattern: impl Into<UrlPattern>) -> Self {
        self.url_patterns
            .get_or_insert_with(Vec::new)
            .push(pattern.into());
        self
    }

    /// Adds several URL patterns to the scope. An empty list leaves it unchanged.
    #[must_use]
    pub fn with_url_patterns(mut self, patterns: impl IntoIterator<Item = UrlPattern>) -> Self {
        for pattern in patterns {
            self = self.with_url_pattern(pattern);
        }
        self
    }
}

#[derive(Deserialize)]
struct AddInterceptResult {
    intercept: InterceptId,
}

// ============================================================================
// Network
// ============================================================================

/// Network domain commands and listeners.
#[derive(Debug, Clone)]
pub struct Network {
    broker: Broker,
}

impl Network {
    /// Creates a facade over `broker`.
    #[inline]
    #[must_use]
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }

    // ========================================================================
    // Intercepts
    // ========================================================================

    /// Adds an intercept (`network.addIntercept`).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if no phase is given
    /// - Any error of [`Broker::send`]
    pub async fn add_intercept(&self, options: InterceptOptions) -> Result<Intercept> {
        if options.phases.is_empty() {
            return Err(Error::invalid_argument("intercept needs at least one phase"));
        }

        let InterceptOptions {
            phases,
            contexts,
            url_patterns,
        } = options;

        let result: AddInterceptResult = self
            .broker
            .send(NetworkCommand::AddIntercept {
                phases: phases.clone(),
                contexts,
                url_patterns,
            })
            .await?;

        debug!(intercept = %result.intercept, ?phases, "Intercept added");
        Ok(Intercept::new(result.intercept, phases, self.broker.clone()))
    }

    /// Intercepts requests before they are sent.
    ///
    /// An empty `url_patterns` intercepts every request. The handler is in
    /// place before the intercept exists, so no blocked event is missed.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Network::add_intercept`] or of registering the handler.
    pub async fn intercept_requests<F, Fut>(
        &self,
        url_patterns: Vec<UrlPattern>,
        handler: F,
    ) -> Result<Intercept>
    where
        F: Fn(BeforeRequestSentParameters, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.intercept_with(url_patterns, handler).await
    }

    /// Intercepts responses once their headers arrived.
    ///
    /// # Errors
    ///
    /// See [`Network::intercept_requests`].
    pub async fn intercept_responses<F, Fut>(
        &self,
        url_patterns: Vec<UrlPattern>,
        handler: F,
    ) -> Result<Intercept>
    where
        F: Fn(ResponseStartedParameters, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.intercept_with(url_patterns, handler).await
    }

    /// Intercepts authentication challenges.
    ///
    /// # Errors
    ///
    /// See [`Network::intercept_requests`].
    pub async fn intercept_auth<F, Fut>(
        &self,
        url_patterns: Vec<UrlPattern>,
        handler: F,
    ) -> Result<Intercept>
    where
        F: Fn(AuthRequiredParameters, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.intercept_with(url_patterns, handler).await
    }

    /// Adds an intercept for `E`'s phase with `handler` already registered.
    ///
    /// The handler is subscribed before `network.addIntercept` is sent, so a
    /// blocked event dispatched ahead of the reply is held and replayed
    /// rather than lost.
    async fn intercept_with<E, F, Fut>(
        &self,
        url_patterns: Vec<UrlPattern>,
        handler: F,
    ) -> Result<Intercept>
    where
        E: BlockingEvent,
        F: Fn(E, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let early = EarlyHandler::subscribe(&self.broker, handler)?;
        let options = InterceptOptions::new([E::PHASE]).with_url_patterns(url_patterns);
        let intercept = self.add_intercept(options).await?;
        early.open(&intercept);
        Ok(intercept)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Observes every `network.beforeRequestSent` event.
    ///
    /// Listeners run inline on the dispatch loop and see blocked and
    /// unblocked requests alike; they cannot decide.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after teardown.
    pub fn on_before_request_sent<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(BeforeRequestSentParameters) + Send + Sync + 'static,
    {
        self.listen(listener)
    }

    /// Observes every `network.responseStarted` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after teardown.
    pub fn on_response_started<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(ResponseStartedParameters) + Send + Sync + 'static,
    {
        self.listen(listener)
    }

    /// Observes every `network.responseCompleted` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after teardown.
    pub fn on_response_completed<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(ResponseCompletedParameters) + Send + Sync + 'static,
    {
        self.listen(listener)
    }

    /// Observes every `network.fetchError` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after teardown.
    pub fn on_fetch_error<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(FetchErrorParameters) + Send + Sync + 'static,
    {
        self.listen(listener)
    }

    /// Observes every `network.authRequired` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after teardown.
    pub fn on_auth_required<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(AuthRequiredParameters) + Send + Sync + 'static,
    {
        self.listen(listener)
    }

    fn listen<E, F>(&self, listener: F) -> Result<Subscription>
    where
        E: LifecycleEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        let handler = EventHandler::sync(move |event| match event.decode::<E>() {
            Ok(payload) => listener(payload),
            Err(e) => warn!(method = %event.method, error = %e, "Dropped malformed event"),
        });
        self.broker.subscribe(E::METHOD, handler, None)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::protocol::types::UrlPatternPattern;
    use crate::session::SessionOptions;
    use crate::transport::{ChannelTransport, RemoteEnd};

    fn network() -> (Network, RemoteEnd) {
        let (transport, _inbound, remote) = ChannelTransport::pair();
        let broker = Broker::new(Arc::new(transport), SessionOptions::new());
        (Network::new(broker), remote)
    }

    fn request_event(method: &str, blocked: bool) -> String {
        json!({
            "type": "event",
            "method": method,
            "params": {
                "isBlocked": blocked,
                "redirectCount": 0,
                "request": { "request": "r-1", "url": "https://example.com/", "method": "GET" },
                "timestamp": 1,
                "errorText": "NS_ERROR_FAILURE",
                "response": { "url": "https://example.com/", "status": 200 }
            }
        })
        .to_string()
    }

    #[test]
    fn test_options_builder() {
        let options = InterceptOptions::new([InterceptPhase::ResponseStarted])
            .with_context("ctx-1")
            .with_url_pattern(UrlPatternPattern::default().with_hostname("example.com"))
            .with_url_patterns(Vec::new());

        assert_eq!(options.phases, vec![InterceptPhase::ResponseStarted]);
        assert_eq!(options.contexts, Some(vec![ContextId::new("ctx-1")]));
        assert_eq!(options.url_patterns.as_ref().map(Vec::len), Some(1));
        assert_eq!(InterceptOptions::new(Vec::new()).url_patterns, None);
    }

    #[tokio::test]
    async fn test_add_intercept() {
        let (network, mut remote) = network();

        let respond = async {
            let frame = remote.recv_json().await.expect("frame");
            assert_eq!(frame["method"], "network.addIntercept");
            assert_eq!(
                frame["params"],
                json!({ "phases": ["beforeRequestSent", "authRequired"], "contexts": ["ctx-1"] })
            );
            let reply = json!({ "id": frame["id"], "result": { "intercept": "i-9" } });
            network.broker.on_message(&reply.to_string()).expect("response");
        };
        let options = InterceptOptions::new([
            InterceptPhase::BeforeRequestSent,
            InterceptPhase::AuthRequired,
        ])
        .with_context("ctx-1");
        let (intercept, ()) = tokio::join!(network.add_intercept(options), respond);

        let intercept = intercept.expect("intercept");
        assert_eq!(intercept.id().as_str(), "i-9");
        assert_eq!(intercept.phases().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_phases_rejected_locally() {
        let (network, mut remote) = network();
        let err = network
            .add_intercept(InterceptOptions::new(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(remote.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_listeners_see_unblocked_events() {
        let (network, _remote) = network();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        network
            .on_before_request_sent(move |params| sink.lock().push(params.base.request.url))
            .expect("listen");
        let sink = Arc::clone(&seen);
        network
            .on_fetch_error(move |params| sink.lock().push(params.error_text))
            .expect("listen");
        let sink = Arc::clone(&seen);
        network
            .on_response_completed(move |params| sink.lock().push(params.response.status.to_string()))
            .expect("listen");

        let broker = &network.broker;
        broker
            .on_message(&request_event("network.beforeRequestSent", false))
            .expect("event");
        broker
            .on_message(&request_event("network.fetchError", false))
            .expect("event");
        broker
            .on_message(&request_event("network.responseCompleted", true))
            .expect("event");

        assert_eq!(
            *seen.lock(),
            vec!["https://example.com/", "NS_ERROR_FAILURE", "200"]
        );
    }

    #[tokio::test]
    async fn test_malformed_event_is_dropped() {
        let (network, _remote) = network();
        let seen = Arc::new(Mutex::new(0));

        let sink = Arc::clone(&seen);
        network
            .on_auth_required(move |_| *sink.lock() += 1)
            .expect("listen");

        let malformed = json!({ "method": "network.authRequired", "params": { "isBlocked": true } });
        network
            .broker
            .on_message(&malformed.to_string())
            .expect("dispatch continues");
        assert_eq!(*seen.lock(), 0);
    }
}
