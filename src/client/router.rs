//! Inbound message demultiplexer.
//!
//! [`MessageRouter`] owns two listener tables: one keyed by message kind
//! for publish/subscribe, one keyed by correlation id for the
//! [`super::Correlator`]. Dispatch works on a snapshot of the relevant
//! listener lists, so a listener may subscribe or unsubscribe (itself or
//! others) while it runs. A failing listener is logged and skipped; it
//! never stops delivery to the others.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;

use crate::domain::Message;

/// Listener key that receives every routed message in full.
pub const CATCH_ALL: &str = "message";

/// Error type a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by event listeners.
pub type ListenerResult = Result<(), ListenerError>;

/// Callback invoked with a message payload (or the full message for
/// [`CATCH_ALL`]).
pub type EventListener = Arc<dyn Fn(&Value) -> ListenerResult + Send + Sync>;

/// Callback invoked with a message that carries a watched correlation id.
pub type CorrelationListener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Identifies one registration in the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    events: HashMap<String, Vec<(ListenerId, EventListener)>>,
    correlations: HashMap<String, Vec<(ListenerId, CorrelationListener)>>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// Dispatches inbound messages to event and correlation listeners.
#[derive(Clone, Default)]
pub struct MessageRouter {
    registry: Arc<Mutex<Registry>>,
}

impl MessageRouter {
    /// Creates a router with empty listener tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for messages of `event_type`.
    ///
    /// Use [`CATCH_ALL`] to receive every message in full. The returned
    /// [`Subscription`] removes exactly this registration.
    pub fn on<F>(&self, event_type: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry
                .events
                .entry(event_type.clone())
                .or_default()
                .push((id, Arc::new(listener)));
            id
        };
        Subscription {
            registry: Arc::downgrade(&self.registry),
            event_type,
            id,
        }
    }

    /// Removes one listener of `event_type`, or all of them when `listener`
    /// is `None`. Returns the number of registrations removed.
    pub fn off(&self, event_type: &str, listener: Option<ListenerId>) -> usize {
        remove_event_listener(&mut self.lock(), event_type, listener)
    }

    /// Registers a listener for messages carrying correlation id `id`.
    pub fn on_correlation<F>(&self, id: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let listener_id = registry.allocate();
        registry
            .correlations
            .entry(id.into())
            .or_default()
            .push((listener_id, Arc::new(listener)));
        listener_id
    }

    /// Removes one correlation listener for `id`, or all of them when
    /// `listener` is `None`. Returns the number of registrations removed.
    pub fn off_correlation(&self, id: &str, listener: Option<ListenerId>) -> usize {
        let mut registry = self.lock();
        let Some(listeners) = registry.correlations.get_mut(id) else {
            return 0;
        };
        let before = listeners.len();
        match listener {
            Some(target) => listeners.retain(|(lid, _)| *lid != target),
            None => listeners.clear(),
        }
        let removed = before - listeners.len();
        if listeners.is_empty() {
            registry.correlations.remove(id);
        }
        removed
    }

    /// Dispatches a decoded message and returns how many listeners ran.
    ///
    /// Order: listeners of `message.kind` with the payload, then
    /// [`CATCH_ALL`] listeners with the full message, then correlation
    /// listeners when `message.id` is set.
    pub fn dispatch(&self, message: &Message) -> usize {
        let kind = message.kind.as_str();
        let (typed, catch_all, correlated) = {
            let registry = self.lock();
            let typed = if kind == CATCH_ALL {
                Vec::new()
            } else {
                registry.events.get(kind).cloned().unwrap_or_default()
            };
            let catch_all = registry.events.get(CATCH_ALL).cloned().unwrap_or_default();
            let correlated = message
                .id
                .as_deref()
                .and_then(|id| registry.correlations.get(id))
                .cloned()
                .unwrap_or_default();
            (typed, catch_all, correlated)
        };

        let mut invoked = 0;
        for (id, listener) in &typed {
            invoke_event_listener(kind, *id, listener, &message.payload);
            invoked += 1;
        }

        if !catch_all.is_empty() {
            match serde_json::to_value(message) {
                Ok(full) => {
                    for (id, listener) in &catch_all {
                        invoke_event_listener(CATCH_ALL, *id, listener, &full);
                        invoked += 1;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not encode message for catch-all listeners"),
            }
        }

        for (_, listener) in &correlated {
            let _ = guarded("correlation listener", || listener(message));
            invoked += 1;
        }

        invoked
    }

    /// Removes every event and correlation listener.
    pub fn clear(&self) {
        let mut registry = self.lock();
        registry.events.clear();
        registry.correlations.clear();
    }

    /// Number of listeners registered for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.lock().events.get(event_type).map_or(0, Vec::len)
    }

    /// Number of listeners registered for correlation id `id`.
    #[must_use]
    pub fn correlation_count(&self, id: &str) -> usize {
        self.lock().correlations.get(id).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        lock_registry(&self.registry)
    }
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("MessageRouter")
            .field("event_types", &registry.events.len())
            .field("correlations", &registry.correlations.len())
            .finish()
    }
}

/// Handle for one event listener registration.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event_type: String,
    id: ListenerId,
}

impl Subscription {
    /// Removes the listener. Idempotent and safe to call from within the
    /// listener itself. Returns `true` if the listener was still registered.
    pub fn unsubscribe(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed =
            remove_event_listener(&mut lock_registry(&registry), &self.event_type, Some(self.id));
        removed > 0
    }

    /// Identifier of the registration, usable with [`MessageRouter::off`].
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Event type the listener is registered for.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn remove_event_listener(
    registry: &mut Registry,
    event_type: &str,
    listener: Option<ListenerId>,
) -> usize {
    let Some(listeners) = registry.events.get_mut(event_type) else {
        return 0;
    };
    let before = listeners.len();
    match listener {
        Some(target) => listeners.retain(|(id, _)| *id != target),
        None => listeners.clear(),
    }
    let removed = before - listeners.len();
    if listeners.is_empty() {
        registry.events.remove(event_type);
    }
    removed
}

fn invoke_event_listener(kind: &str, id: ListenerId, listener: &EventListener, value: &Value) {
    match guarded("event listener", || listener(value)) {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            tracing::warn!(event_type = kind, listener = id.0, error = %e, "listener failed");
        }
        None => {
            tracing::warn!(event_type = kind, listener = id.0, "listener panicked");
        }
    }
}

/// Runs a user callback, converting a panic into `None` and a log line.
pub(crate) fn guarded<R>(context: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            tracing::error!(context, reason = %reason, "callback panicked");
            None
        }
    }
}
