//! Network intercepts.
//!
//! An [`Intercept`] is a remote registration that blocks matching requests
//! in one or more phases. Handlers registered on it only see events whose
//! `intercepts` list names it, and each receives a [`BlockedRequest`] to
//! decide with.
//!
//! The intercept owns the subscriptions of its handlers: [`Intercept::remove`]
//! releases them after sending `network.removeIntercept`, and dropping the
//! intercept releases them without contacting the remote end.
//!
//! Events already dispatched when `remove` runs may still reach a handler.
//!
//! `EarlyHandler` covers the window between sending `network.addIntercept`
//! and learning the new id: it holds the events of its kind and replays the
//! ones the intercept blocks once the id is known.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::broker::{AsyncHandler, Broker, EventFilter, EventHandler, Subscription};
use crate::error::{Error, Result};
use crate::identifiers::InterceptId;
use crate::protocol::types::InterceptPhase;
use crate::protocol::{
    AuthRequiredParameters, BeforeRequestSentParameters, BlockingEvent, Event, NetworkCommand,
    ResponseStartedParameters,
};

use super::request::BlockedRequest;

// ============================================================================
// Intercept
// ============================================================================

#[derive(Default)]
struct InterceptState {
    removed: bool,
    owned: Vec<Subscription>,
}

/// A network intercept and the handlers registered on it.
///
/// Equality and hashing use the intercept id.
pub struct Intercept {
    id: InterceptId,
    phases: Vec<InterceptPhase>,
    broker: Broker,
    state: Mutex<InterceptState>,
}

impl Intercept {
    pub(crate) fn new(id: InterceptId, phases: Vec<InterceptPhase>, broker: Broker) -> Self {
        Self {
            id,
            phases,
            broker,
            state: Mutex::new(InterceptState::default()),
        }
    }

    /// Returns the intercept id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &InterceptId {
        &self.id
    }

    /// Returns the phases the intercept blocks in.
    #[inline]
    #[must_use]
    pub fn phases(&self) -> &[InterceptPhase] {
        &self.phases
    }

    /// Returns `true` once [`Intercept::remove`] was called.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.state.lock().removed
    }

    /// Returns the number of handlers registered on this intercept.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.state.lock().owned.len()
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Handles requests blocked before they are sent.
    ///
    /// # Errors
    ///
    /// - [`Error::InterceptRemoved`] after [`Intercept::remove`]
    /// - [`Error::PhaseNotIntercepted`] if the intercept does not cover the phase
    /// - [`Error::SessionClosed`] after teardown
    pub fn on_before_request_sent<F, Fut>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(BeforeRequestSentParameters, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_blocked(handler)
    }

    /// Handles requests blocked once response headers arrived.
    ///
    /// # Errors
    ///
    /// See [`Intercept::on_before_request_sent`].
    pub fn on_response_started<F, Fut>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(ResponseStartedParameters, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_blocked(handler)
    }

    /// Handles requests blocked on an authentication challenge.
    ///
    /// # Errors
    ///
    /// See [`Intercept::on_before_request_sent`].
    pub fn on_auth_required<F, Fut>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(AuthRequiredParameters, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_blocked(handler)
    }

    /// Subscribes `handler` to `E`, filtered to requests this intercept blocks.
    fn on_blocked<E, F, Fut>(&self, handler: F) -> Result<Subscription>
    where
        E: BlockingEvent,
        F: Fn(E, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.removed {
            return Err(Error::intercept_removed(self.id.clone()));
        }
        if !self.phases.contains(&E::PHASE) {
            return Err(Error::phase_not_intercepted(self.id.clone(), E::PHASE));
        }

        let id = self.id.clone();
        let filter: EventFilter = Arc::new(move |event: &Event| event.is_blocked_by(&id));
        let handler = EventHandler::Async(blocked_handler(self.broker.clone(), handler));

        let subscription = self.broker.subscribe(E::METHOD, handler, Some(filter))?;
        trace!(intercept = %self.id, phase = %E::PHASE, subscription = %subscription.id(), "Handler registered");
        state.owned.push(subscription.clone());
        Ok(subscription)
    }

    /// Takes ownership of a handler registered before the intercept existed.
    fn adopt(&self, subscription: Subscription) {
        let mut state = self.state.lock();
        if state.removed {
            subscription.unsubscribe();
            return;
        }
        trace!(intercept = %self.id, subscription = %subscription.id(), "Handler adopted");
        state.owned.push(subscription);
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Removes the intercept (`network.removeIntercept`).
    ///
    /// The handlers are released even if the command fails.
    ///
    /// # Errors
    ///
    /// - [`Error::InterceptRemoved`] if already removed
    /// - Any error of [`Broker::send`]
    pub async fn remove(&self) -> Result<()> {
        let owned = {
            let mut state = self.state.lock();
            if state.removed {
                return Err(Error::intercept_removed(self.id.clone()));
            }
            state.removed = true;
            std::mem::take(&mut state.owned)
        };

        let result = self
            .broker
            .send::<Value>(NetworkCommand::RemoveIntercept {
                intercept: self.id.clone(),
            })
            .await
            .map(|_| ());

        for subscription in &owned {
            subscription.unsubscribe();
        }

        debug!(intercept = %self.id, handlers = owned.len(), ok = result.is_ok(), "Intercept removed");
        result
    }
}

/// Wraps a typed handler: decodes the payload and builds the [`BlockedRequest`].
fn blocked_handler<E, F, Fut>(broker: Broker, handler: F) -> AsyncHandler
where
    E: BlockingEvent,
    F: Fn(E, BlockedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |event: Arc<Event>| {
        let broker = broker.clone();
        let handler = Arc::clone(&handler);
        async move {
            let payload: E = event.decode()?;
            let request = BlockedRequest::new(
                payload.base().request.request.clone(),
                E::PHASE,
                broker,
                event.decision.clone(),
            );
            handler(payload, request).await
        }
        .boxed()
    })
}

// ============================================================================
// EarlyHandler
// ============================================================================

#[derive(Default)]
struct Gate {
    id: Option<InterceptId>,
    held: Vec<Arc<Event>>,
}

/// A blocked-request handler subscribed before its intercept id is known.
///
/// Dropping it before [`EarlyHandler::open`] unsubscribes.
pub(super) struct EarlyHandler {
    gate: Arc<Mutex<Gate>>,
    run: AsyncHandler,
    subscription: Option<Subscription>,
}

impl EarlyHandler {
    /// Subscribes `handler` to `E`, holding every event until the id is known.
    pub(super) fn subscribe<E, F, Fut>(broker: &Broker, handler: F) -> Result<Self>
    where
        E: BlockingEvent,
        F: Fn(E, BlockedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let gate = Arc::new(Mutex::new(Gate::default()));
        let run = blocked_handler(broker.clone(), handler);

        let filter_gate = Arc::clone(&gate);
        let filter: EventFilter = Arc::new(move |event: &Event| match &filter_gate.lock().id {
            Some(id) => event.is_blocked_by(id),
            None => true,
        });

        let handler_gate = Arc::clone(&gate);
        let handler_run = Arc::clone(&run);
        let handler = EventHandler::Async(Arc::new(move |event: Arc<Event>| {
            let mut gate = handler_gate.lock();
            let Some(id) = gate.id.clone() else {
                gate.held.push(event);
                return future::ready(Ok(())).boxed();
            };
            drop(gate);
            if event.is_blocked_by(&id) {
                handler_run(event)
            } else {
                future::ready(Ok(())).boxed()
            }
        }));

        let subscription = broker.subscribe(E::METHOD, handler, Some(filter))?;
        Ok(Self {
            gate,
            run,
            subscription: Some(subscription),
        })
    }

    /// Binds the handler to `intercept`, replays the held events it blocks
    /// and hands the subscription over.
    pub(super) fn open(mut self, intercept: &Intercept) {
        let held = {
            let mut gate = self.gate.lock();
            gate.id = Some(intercept.id.clone());
            std::mem::take(&mut gate.held)
        };
        let Some(subscription) = self.subscription.take() else {
            return;
        };

        let mut replayed = 0;
        for event in held.into_iter().filter(|event| event.is_blocked_by(&intercept.id)) {
            let future = (self.run)(event);
            let id = subscription.id();
            tokio::spawn(async move {
                if let Err(e) = future.await {
                    warn!(subscription = %id, error = %e, "Event handler failed");
                }
            });
            replayed += 1;
        }
        if replayed > 0 {
            debug!(intercept = %intercept.id, replayed, "Replayed events held during addIntercept");
        }

        intercept.adopt(subscription);
    }
}

impl Drop for EarlyHandler {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for Intercept {
    fn drop(&mut self) {
        for subscription in self.state.get_mut().owned.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl PartialEq for Intercept {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Intercept {}

impl Hash for Intercept {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Intercept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercept")
            .field("id", &self.id)
            .field("phases", &self.phases)
            .field("removed", &self.is_removed())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::session::SessionOptions;
    use crate::transport::{ChannelTransport, RemoteEnd};

    fn intercept(phases: Vec<InterceptPhase>) -> (Intercept, RemoteEnd) {
        let (transport, _inbound, remote) = ChannelTransport::pair();
        let broker = Broker::new(Arc::new(transport), SessionOptions::new());
        (Intercept::new(InterceptId::new("i-1"), phases, broker), remote)
    }

    async fn noop(_: BeforeRequestSentParameters, _: BlockedRequest) -> Result<()> {
        Ok(())
    }

    #[tokio::test]
    async fn test_phase_not_intercepted() {
        let (intercept, _remote) = intercept(vec![InterceptPhase::ResponseStarted]);
        let err = intercept.on_before_request_sent(noop).unwrap_err();
        assert!(matches!(
            err,
            Error::PhaseNotIntercepted { phase: InterceptPhase::BeforeRequestSent, .. }
        ));
        assert_eq!(intercept.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_releases_handlers() {
        let (intercept, mut remote) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        let subscription = intercept.on_before_request_sent(noop).expect("register");
        assert!(subscription.is_active());

        let respond = async {
            let frame = remote.recv_json().await.expect("frame");
            assert_eq!(frame["method"], "network.removeIntercept");
            assert_eq!(frame["params"], json!({ "intercept": "i-1" }));
            intercept
                .broker
                .on_message(&json!({ "id": frame["id"], "result": {} }).to_string())
                .expect("response");
        };
        let (result, ()) = tokio::join!(intercept.remove(), respond);
        result.expect("remove");

        assert!(!subscription.is_active());
        assert!(intercept.is_removed());
        assert_eq!(intercept.broker.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_releases_handlers_on_failure() {
        let (intercept, mut remote) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        let subscription = intercept.on_before_request_sent(noop).expect("register");

        let respond = async {
            let frame = remote.recv_json().await.expect("frame");
            let reply = json!({ "id": frame["id"], "error": "no such intercept", "message": "gone" });
            intercept.broker.on_message(&reply.to_string()).expect("response");
        };
        let (result, ()) = tokio::join!(intercept.remove(), respond);

        assert!(matches!(result, Err(Error::Remote { .. })));
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn test_removed_intercept_refuses_work() {
        let (intercept, remote) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        remote.close("gone");
        intercept.broker.close("gone");

        assert!(intercept.remove().await.is_err());
        assert!(matches!(
            intercept.remove().await,
            Err(Error::InterceptRemoved { .. })
        ));
        assert!(matches!(
            intercept.on_before_request_sent(noop),
            Err(Error::InterceptRemoved { .. })
        ));
    }

    #[tokio::test]
    async fn test_drop_releases_handlers() {
        let (intercept, _remote) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        let broker = intercept.broker.clone();
        let subscription = intercept.on_before_request_sent(noop).expect("register");
        assert_eq!(broker.subscription_count(), 1);

        drop(intercept);
        assert!(!subscription.is_active());
        assert_eq!(broker.subscription_count(), 0);
    }

    fn blocked_frame(request: &str, intercepts: &[&str]) -> String {
        json!({
            "type": "event",
            "method": "network.beforeRequestSent",
            "params": {
                "isBlocked": !intercepts.is_empty(),
                "intercepts": intercepts,
                "redirectCount": 0,
                "request": { "request": request, "url": "https://example.com/", "method": "GET" },
                "timestamp": 1
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_early_handler_replays_held_events() {
        let (intercept, _remote) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        let broker = intercept.broker.clone();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let early = EarlyHandler::subscribe(&broker, move |params: BeforeRequestSentParameters, _| {
            let _ = tx.send(params.base.request.request);
            async { Ok(()) }
        })
        .expect("subscribe");

        // Arrives before the id is known; only r-1 names the intercept
        broker.on_message(&blocked_frame("r-1", &["i-1"])).expect("event");
        broker.on_message(&blocked_frame("r-2", &["other"])).expect("event");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        early.open(&intercept);
        assert_eq!(intercept.handler_count(), 1);
        assert_eq!(rx.recv().await.expect("replayed").as_str(), "r-1");

        broker.on_message(&blocked_frame("r-3", &["other"])).expect("event");
        broker.on_message(&blocked_frame("r-4", &["i-1"])).expect("event");
        assert_eq!(rx.recv().await.expect("live").as_str(), "r-4");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_early_handler_drop_unsubscribes() {
        let (intercept, _remote) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        let broker = intercept.broker.clone();

        let early = EarlyHandler::subscribe(&broker, noop).expect("subscribe");
        assert_eq!(broker.subscription_count(), 1);

        drop(early);
        assert_eq!(broker.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_equality_by_id() {
        let (a, _r1) = intercept(vec![InterceptPhase::BeforeRequestSent]);
        let (b, _r2) = intercept(vec![InterceptPhase::AuthRequired]);
        assert_eq!(a, b);
    }
}
