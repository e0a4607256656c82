//! Command correlation and event dispatch.
//!
//! The [`Broker`] multiplexes many outstanding commands and many event
//! subscribers over one ordered message stream.
//!
//! # Flow
//!
//! ```text
//! send(command) ──► allocate id ──► register pending ──► Transport::send
//!                                                              │
//! caller ◄── result ◄── pending[id] ◄── on_message(response) ◄─┘
//!
//! on_message(event) ──► parse once ──► subscriptions[method] (in order)
//!                                        ├─ Sync: run inline
//!                                        └─ Async: tokio::spawn
//! ```
//!
//! `on_message` must be called in arrival order and never concurrently with
//! itself; the session's dispatch loop guarantees both.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Command, Event, Message, Request};
use crate::session::SessionOptions;
use crate::transport::Transport;

// ============================================================================
// Submodules
// ============================================================================

/// Event subscriptions and handler types.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use subscription::{AsyncHandler, EventFilter, EventHandler, Subscription, SyncHandler};

use subscription::Registry;

// ============================================================================
// Types
// ============================================================================

/// An in-flight command awaiting its response.
struct PendingCall {
    method: String,
    result_tx: oneshot::Sender<Result<Value>>,
}

/// Map of command ids to pending calls.
type CorrelationMap = FxHashMap<CommandId, PendingCall>;

// ============================================================================
// Broker
// ============================================================================

/// Correlates commands with responses and routes events to subscriptions.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    transport: Arc<dyn Transport>,
    options: SessionOptions,
    next_id: AtomicU64,
    closed: AtomicBool,
    correlation: Mutex<CorrelationMap>,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("pending", &self.pending_count())
            .field("subscriptions", &self.subscription_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Broker {
    /// Creates a broker sending through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, options: SessionOptions) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                transport,
                options,
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                correlation: Mutex::new(CorrelationMap::default()),
                registry: Arc::new(Registry::default()),
            }),
        }
    }

    /// Returns the options the broker was created with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends a command and decodes its result with the default timeout.
    ///
    /// # Errors
    ///
    /// - Any error of [`Broker::send_raw_with_timeout`]
    /// - [`Error::Decode`] if the result does not match `T`
    pub async fn send<T: DeserializeOwned>(&self, command: impl Into<Command>) -> Result<T> {
        self.send_with_timeout(command, self.inner.options.command_timeout)
            .await
    }

    /// Sends a command and decodes its result with a custom timeout.
    ///
    /// # Errors
    ///
    /// See [`Broker::send`].
    pub async fn send_with_timeout<T: DeserializeOwned>(
        &self,
        command: impl Into<Command>,
        command_timeout: Duration,
    ) -> Result<T> {
        let (method, params) = command.into().to_parts()?;
        let value = self
            .send_raw_with_timeout(&method, params, command_timeout)
            .await?;
        T::deserialize(value)
            .map_err(|e| Error::decode(std::any::type_name::<T>(), e.to_string()))
    }

    /// Sends a command by method name with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`Broker::send_raw_with_timeout`].
    pub async fn send_raw(&self, method: &str, params: Value) -> Result<Value> {
        self.send_raw_with_timeout(method, params, self.inner.options.command_timeout)
            .await
    }

    /// Sends a command by method name and waits for its result.
    ///
    /// Dropping the returned future before it completes removes the pending
    /// entry; a late response is then ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the session is closed or closes while waiting
    /// - [`Error::TooManyPendingCommands`] if the in-flight limit is reached
    /// - [`Error::CommandTimeout`] if no response arrives within `command_timeout`
    /// - [`Error::Remote`] if the remote end answers with an error
    /// - Transport errors if the frame cannot be sent
    pub async fn send_raw_with_timeout(
        &self,
        method: &str,
        params: Value,
        command_timeout: Duration,
    ) -> Result<Value> {
        let id = CommandId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let text = Request::new(id, method, params).to_text()?;

        let (result_tx, result_rx) = oneshot::channel();

        {
            let mut correlation = self.inner.correlation.lock();
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(Error::ConnectionClosed);
            }

            let max = self.inner.options.max_pending;
            if correlation.len() >= max {
                warn!(pending = correlation.len(), max, "Too many pending commands");
                return Err(Error::TooManyPendingCommands {
                    pending: correlation.len(),
                    max,
                });
            }

            correlation.insert(
                id,
                PendingCall {
                    method: method.to_string(),
                    result_tx,
                },
            );
        }

        // Removes the entry on every exit path, including cancellation
        let _guard = PendingGuard {
            inner: &self.inner,
            id,
        };

        self.inner.transport.send(text).await?;
        trace!(%id, method, "Command sent");

        match timeout(command_timeout, result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                debug!(%id, method, "Command timed out");
                Err(Error::command_timeout(
                    id,
                    method,
                    command_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of in-flight commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.lock().len()
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Processes one inbound text frame.
    ///
    /// Responses resolve their pending command; responses for unknown ids
    /// are logged and ignored. Events are delivered to every subscription
    /// registered for the event name whose filter accepts it, in
    /// registration order. Frames arriving after [`Broker::close`] are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not JSON
    /// - [`Error::Protocol`] if the frame is neither a response nor an event,
    ///   or is a malformed response to no pending command
    ///
    /// A malformed response to a pending command fails that command with
    /// [`Error::Protocol`] instead.
    pub fn on_message(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            trace!("Frame ignored after close");
            return Ok(());
        }

        match Message::parse(text)? {
            Message::Response(response) => {
                let call = self.inner.correlation.lock().remove(&response.id);
                match call {
                    Some(call) => {
                        trace!(id = %response.id, method = %call.method, "Response received");
                        let _ = call.result_tx.send(response.into_result());
                    }
                    None => {
                        warn!(id = %response.id, "Response for unknown command");
                    }
                }
            }
            Message::Event(event) => self.dispatch(Arc::new(event)),
            Message::Malformed { id, reason } => {
                let message = format!("malformed response to command {id}: {reason}");
                let call = self.inner.correlation.lock().remove(&id);
                let Some(call) = call else {
                    return Err(Error::protocol(message));
                };
                warn!(%id, method = %call.method, %reason, "Malformed response");
                let _ = call.result_tx.send(Err(Error::protocol(message)));
            }
        }

        Ok(())
    }

    /// Delivers an event to its subscriptions.
    fn dispatch(&self, event: Arc<Event>) {
        let entries = self.inner.registry.matching(&event.method);
        trace!(method = %event.method, subscriptions = entries.len(), "Dispatching event");

        for entry in entries {
            if !entry.accepts(&event) {
                continue;
            }

            match &entry.handler {
                EventHandler::Sync(handler) => handler(event.as_ref()),
                EventHandler::Async(handler) => {
                    let future = handler(Arc::clone(&event));
                    let method = event.method.clone();
                    let id = entry.id;
                    tokio::spawn(async move {
                        if let Err(e) = future.await {
                            warn!(subscription = %id, %method, error = %e, "Event handler failed");
                        }
                    });
                }
            }
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Registers a handler for `event`.
    ///
    /// Takes effect for the next message processed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] after [`Broker::close`].
    pub fn subscribe(
        &self,
        event: &str,
        handler: EventHandler,
        filter: Option<EventFilter>,
    ) -> Result<Subscription> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let id = self
            .inner
            .registry
            .insert(event, handler, filter)
            .ok_or(Error::SessionClosed)?;
        trace!(%id, event, "Subscribed");
        Ok(Subscription::new(id, event, &self.inner.registry))
    }

    /// Removes a subscription. Idempotent.
    ///
    /// Returns `true` if this call removed it.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.unsubscribe()
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Fails every pending command with [`Error::ConnectionClosed`] and drops
    /// every subscription. Idempotent.
    pub fn close(&self, reason: &str) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending: Vec<_> = self.inner.correlation.lock().drain().collect();
        let count = pending.len();
        for (_, call) in pending {
            let _ = call.result_tx.send(Err(Error::ConnectionClosed));
        }

        self.inner.registry.close();

        debug!(reason, failed = count, "Broker closed");
    }

    /// Returns `true` after [`Broker::close`].
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns the transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes a correlation entry when the sending future finishes or is dropped.
struct PendingGuard<'a> {
    inner: &'a BrokerInner,
    id: CommandId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(call) = self.inner.correlation.lock().remove(&self.id) {
            trace!(id = %self.id, method = %call.method, "Removed abandoned command");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
