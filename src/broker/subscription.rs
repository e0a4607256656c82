//! Event subscriptions.
//!
//! The registry maps an event name to its subscriptions in registration
//! order. A [`Subscription`] is a cloneable handle that removes exactly its
//! own entry; removing it twice, or after the session closed, is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::protocol::Event;

// ============================================================================
// Handler Types
// ============================================================================

/// Handler run inline on the dispatch loop.
pub type SyncHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handler whose future is spawned onto the runtime.
pub type AsyncHandler = Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Predicate deciding whether a subscription receives an event.
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// An event handler.
///
/// Sync handlers run on the dispatch loop before the next inbound message is
/// processed, so they must not block. Async handlers are spawned and may
/// issue commands; their errors are logged.
#[derive(Clone)]
pub enum EventHandler {
    /// Runs inline.
    Sync(SyncHandler),
    /// Spawned onto the runtime.
    Async(AsyncHandler),
}

impl EventHandler {
    /// Wraps an inline handler.
    #[must_use]
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(handler))
    }

    /// Wraps an async handler.
    #[must_use]
    pub fn spawn<F, Fut>(handler: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::Async(Arc::new(move |event: Arc<Event>| handler(event).boxed()))
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("EventHandler::Sync"),
            Self::Async(_) => f.write_str("EventHandler::Async"),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// One registered subscription.
pub(crate) struct Entry {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: EventHandler,
    pub(crate) filter: Option<EventFilter>,
}

impl Entry {
    /// Returns `true` if the filter accepts `event`.
    #[inline]
    pub(crate) fn accepts(&self, event: &Event) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}

#[derive(Default)]
struct RegistryState {
    closed: bool,
    entries: FxHashMap<String, Vec<Arc<Entry>>>,
}

/// Subscriptions keyed by event name.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Appends a subscription. Returns `None` once the registry is closed.
    pub(crate) fn insert(
        &self,
        event: &str,
        handler: EventHandler,
        filter: Option<EventFilter>,
    ) -> Option<SubscriptionId> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        state
            .entries
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(Entry {
                id,
                handler,
                filter,
            }));
        Some(id)
    }

    /// Removes a subscription by identity. Returns `true` if it was present.
    pub(crate) fn remove(&self, event: &str, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let Some(list) = state.entries.get_mut(event) else {
            return false;
        };

        let before = list.len();
        list.retain(|entry| entry.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            state.entries.remove(event);
        }
        removed
    }

    /// Snapshot of the subscriptions for `event`, in registration order.
    pub(crate) fn matching(&self, event: &str) -> Vec<Arc<Entry>> {
        self.state
            .lock()
            .entries
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if the subscription is still registered.
    pub(crate) fn contains(&self, event: &str, id: SubscriptionId) -> bool {
        self.state
            .lock()
            .entries
            .get(event)
            .is_some_and(|list| list.iter().any(|entry| entry.id == id))
    }

    /// Number of live subscriptions.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.values().map(Vec::len).sum()
    }

    /// Drops every subscription and refuses new ones.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.entries.clear();
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle to one registered event subscription.
///
/// Clones refer to the same subscription. Dropping a handle does not
/// unsubscribe.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    event: Arc<str>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, event: &str, registry: &Arc<Registry>) -> Self {
        Self {
            id,
            event: Arc::from(event),
            registry: Arc::downgrade(registry),
        }
    }

    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the event name.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event
    }

    /// Returns `true` while the subscription is registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(&self.event, self.id))
    }

    /// Removes the subscription. Idempotent.
    ///
    /// Returns `true` if this call removed it.
    pub fn unsubscribe(&self) -> bool {
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(&self.event, self.id));
        if removed {
            trace!(id = %self.id, event = %self.event, "Unsubscribed");
        }
        removed
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
