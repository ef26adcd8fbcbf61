//! Topic-keyed event dispatch
//!
//! A single push transport delivers events tagged with a topic. The
//! [`EventRegistry`] fans each event out to every handler registered for that
//! topic, synchronously and in registration order, so the transport's delivery
//! order is preserved end to end.
//!
//! The registry is an ordinary value: create one per transport and hand clones
//! to the surfaces that need it. Registrations return a [`Subscription`] guard
//! that removes the handler when dropped, tying handler lifetime to the
//! surface that mounted it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Dispatch errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Handlers cannot be registered for an empty topic
    #[error("Topic must not be empty")]
    EmptyTopic,
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Event handler invoked for every event on its topic
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifies one registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    topic: String,
}

impl SubscriptionHandle {
    /// Topic the handler is registered on
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.topic, self.id)
    }
}

struct Registration<P> {
    id: u64,
    handler: Handler<P>,
}

struct RegistryState<P> {
    topics: HashMap<String, Vec<Registration<P>>>,
    next_id: u64,
}

impl<P> RegistryState<P> {
    fn remove(&mut self, handle: &SubscriptionHandle) -> bool {
        let Some(registrations) = self.topics.get_mut(&handle.topic) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.id != handle.id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            self.topics.remove(&handle.topic);
        }

        removed
    }
}

/// Pub/sub fan-out for inbound push events
///
/// # Example
///
/// ```
/// use support_state::dispatch::EventRegistry;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let registry: EventRegistry<String> = EventRegistry::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&seen);
/// let subscription = registry
///     .register("INBOX", move |_event: &String| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
///
/// registry.dispatch("INBOX", &"hello".to_string());
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// drop(subscription);
/// registry.dispatch("INBOX", &"ignored".to_string());
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct EventRegistry<P> {
    state: Arc<Mutex<RegistryState<P>>>,
}

impl<P> EventRegistry<P> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                topics: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a handler for `topic`
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unregistered.
    pub fn register<F>(&self, topic: impl Into<String>, handler: F) -> Result<Subscription<P>>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(DispatchError::EmptyTopic);
        }

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .topics
            .entry(topic.clone())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        drop(state);

        tracing::debug!(topic = %topic, id, "registered push handler");

        Ok(Subscription {
            handle: Some(SubscriptionHandle { id, topic }),
            registry: Arc::downgrade(&self.state),
        })
    }

    /// Remove exactly the handler identified by `handle`
    ///
    /// Returns false when the handler was already removed.
    pub fn unregister(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.state.lock().remove(handle);
        if removed {
            tracing::debug!(handle = %handle, "unregistered push handler");
        }
        removed
    }

    /// Deliver `event` to every handler registered for `topic`
    ///
    /// Handlers run synchronously in registration order. A panicking handler
    /// is logged and skipped; the remaining handlers still receive the event.
    /// Events for topics without handlers are dropped. Returns the number of
    /// handlers that completed.
    pub fn dispatch(&self, topic: &str, event: &P) -> usize {
        // Snapshot so handlers may register or unregister while running.
        let handlers: Vec<Handler<P>> = {
            let state = self.state.lock();
            match state.topics.get(topic) {
                Some(registrations) => registrations.iter().map(|r| Arc::clone(&r.handler)).collect(),
                None => {
                    tracing::trace!(topic, "dropping event for topic without handlers");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!(topic, "push handler panicked; continuing delivery"),
            }
        }
        delivered
    }

    /// Number of handlers registered for `topic`
    pub fn handler_count(&self, topic: &str) -> usize {
        self.state.lock().topics.get(topic).map_or(0, Vec::len)
    }

    /// Whether any handler is registered
    pub fn is_empty(&self) -> bool {
        self.state.lock().topics.is_empty()
    }
}

impl<P> Default for EventRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for EventRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

/// Registration guard returned by [`EventRegistry::register`]
///
/// When dropped, the handler is removed from the registry.
pub struct Subscription<P> {
    handle: Option<SubscriptionHandle>,
    registry: Weak<Mutex<RegistryState<P>>>,
}

impl<P> Subscription<P> {
    /// Handle identifying this registration
    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        self.handle.as_ref()
    }

    /// Remove the handler now
    pub fn unregister(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        match (self.handle.take(), self.registry.upgrade()) {
            (Some(handle), Some(state)) => state.lock().remove(&handle),
            _ => false,
        }
    }
}

impl<P> Drop for Subscription<P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("handle", &self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Box<dyn Fn(&String) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &'static str| -> Box<dyn Fn(&String) + Send + Sync> {
            let sink = Arc::clone(&sink);
            Box::new(move |event: &String| sink.lock().push(format!("{}:{}", name, event)))
        };
        (log, make)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        let _a = registry.register("INBOX", make("a")).unwrap();
        let _b = registry.register("INBOX", make("b")).unwrap();

        registry.dispatch("INBOX", &"1".to_string());
        registry.dispatch("INBOX", &"2".to_string());

        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn test_unregister_removes_exactly_one_handler() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        let a = registry.register("INBOX", make("a")).unwrap();
        let _b = registry.register("INBOX", make("b")).unwrap();

        let handle = a.handle().cloned().unwrap();
        assert!(registry.unregister(&handle));
        assert!(!registry.unregister(&handle));

        registry.dispatch("INBOX", &"1".to_string());
        assert_eq!(*log.lock(), vec!["b:1"]);
        assert_eq!(registry.handler_count("INBOX"), 1);
    }

    #[test]
    fn test_drop_unregisters() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        let sub = registry.register("UPDATE_SENTIMENT", make("a")).unwrap();
        drop(sub);

        assert_eq!(registry.dispatch("UPDATE_SENTIMENT", &"1".to_string()), 0);
        assert!(log.lock().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_topic_is_dropped() {
        let registry: EventRegistry<String> = EventRegistry::new();
        assert_eq!(registry.dispatch("TYPING", &"x".to_string()), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        let _a = registry.register("INBOX", make("a")).unwrap();
        let _boom = registry
            .register("INBOX", |_: &String| panic!("handler failure"))
            .unwrap();
        let _c = registry.register("INBOX", make("c")).unwrap();

        let delivered = registry.dispatch("INBOX", &"1".to_string());

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock(), vec!["a:1", "c:1"]);
    }

    #[test]
    fn test_handler_may_unregister_during_dispatch() {
        let registry: EventRegistry<String> = EventRegistry::new();
        let slot: Arc<Mutex<Option<Subscription<String>>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let sub = registry
            .register("INBOX", move |_: &String| {
                inner.lock().take();
            })
            .unwrap();
        *slot.lock() = Some(sub);

        assert_eq!(registry.dispatch("INBOX", &"1".to_string()), 1);
        assert_eq!(registry.handler_count("INBOX"), 0);
    }

    #[test]
    fn test_empty_topic_rejected() {
        let registry: EventRegistry<String> = EventRegistry::new();
        let err = registry.register("", |_: &String| {}).unwrap_err();
        assert_eq!(err, DispatchError::EmptyTopic);
    }

    #[test]
    fn test_subscription_outliving_registry() {
        let registry: EventRegistry<String> = EventRegistry::new();
        let sub = registry.register("INBOX", |_: &String| {}).unwrap();
        drop(registry);
        assert!(!sub.unregister());
    }
}
