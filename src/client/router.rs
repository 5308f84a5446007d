//! Event Router - dispatches inbound protocol events to local handlers.
//!
//! Handlers are registered per message type and invoked in registration
//! order. Each invocation is isolated: a panicking handler is caught and
//! reported, and the remaining handlers for the same event still run.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Token returned by [`EventRouter::on`], used to unregister that exact
/// handler later. Closures have no identity of their own, so removal is
/// keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Routing statistics snapshot
#[derive(Debug, Default, Clone)]
pub struct RouterStats {
    /// Events handed to dispatch
    pub events_dispatched: u64,
    /// Handler invocations that completed
    pub handlers_invoked: u64,
    /// Handler invocations that panicked
    pub handler_panics: u64,
    /// Per-type event counts
    pub events_by_type: HashMap<String, u64>,
}

/// Registry of per-event-type callbacks
pub struct EventRouter {
    handlers: DashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: AtomicU64,
    events_dispatched: AtomicU64,
    handlers_invoked: AtomicU64,
    handler_panics: AtomicU64,
    events_by_type: DashMap<String, u64>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            next_id: AtomicU64::new(1),
            events_dispatched: AtomicU64::new(0),
            handlers_invoked: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            events_by_type: DashMap::new(),
        }
    }

    /// Register a handler for one event type.
    ///
    /// Multiple handlers per type are allowed and run in registration order.
    pub fn on<F>(&self, event_type: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(event_type, ?id, "Registered event handler");
        id
    }

    /// Remove one handler registration.
    ///
    /// Returns `true` when a handler with this id was registered for the
    /// type and has been removed.
    pub fn off(&self, event_type: &str, id: HandlerId) -> bool {
        let removed = if let Some(mut list) = self.handlers.get_mut(event_type) {
            let before = list.len();
            list.retain(|(registered, _)| *registered != id);
            before != list.len()
        } else {
            false
        };

        self.handlers.remove_if(event_type, |_, list| list.is_empty());

        if removed {
            debug!(event_type, ?id, "Unregistered event handler");
        }
        removed
    }

    /// Invoke every handler registered for this event type.
    ///
    /// The handler list is snapshotted first, so registrations made during
    /// dispatch take effect on the next event, and removals never affect
    /// an in-flight pass. Returns the number of handlers that completed.
    pub fn dispatch(&self, event_type: &str, data: &Value) -> usize {
        let snapshot: Vec<(HandlerId, Handler)> = self
            .handlers
            .get(event_type)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        *self
            .events_by_type
            .entry(event_type.to_string())
            .or_insert(0) += 1;

        if snapshot.is_empty() {
            debug!(event_type, "No handlers registered for event");
            return 0;
        }

        let mut invoked = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(()) => {
                    invoked += 1;
                    self.handlers_invoked.fetch_add(1, Ordering::Relaxed);
                }
                Err(panic) => {
                    let reason = panic_message(&panic);
                    warn!(event_type, ?id, %reason, "Event handler panicked");
                    self.handler_panics.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        invoked
    }

    /// Number of handlers currently registered for a type
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .get(event_type)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Event types with at least one registered handler
    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.handlers.clear();
    }

    /// Get routing statistics
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            events_by_type: self
                .events_by_type
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |tag: &str| -> Handler {
            let log = log_clone.clone();
            let tag = tag.to_string();
            Arc::new(move |_: &Value| {
                log.lock().unwrap().push(tag.clone());
            })
        };
        (log, make)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let router = EventRouter::new();
        let (log, make) = recorder();

        let first = make("first");
        let second = make("second");
        let third = make("third");
        router.on("violation_alert", move |v| first(v));
        router.on("violation_alert", move |v| second(v));
        router.on("violation_alert", move |v| third(v));

        let invoked = router.dispatch("violation_alert", &json!({}));

        assert_eq!(invoked, 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_off_removes_exactly_one() {
        let router = EventRouter::new();
        let (log, make) = recorder();

        let a = make("a");
        let b = make("b");
        let id_a = router.on("x", move |v| a(v));
        router.on("x", move |v| b(v));

        assert!(router.off("x", id_a));
        assert!(!router.off("x", id_a));
        assert_eq!(router.handler_count("x"), 1);

        router.dispatch("x", &json!({}));
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_the_rest() {
        let router = EventRouter::new();
        let (log, make) = recorder();

        let before = make("before");
        let after = make("after");
        router.on("x", move |v| before(v));
        router.on("x", |_: &Value| panic!("handler exploded"));
        router.on("x", move |v| after(v));

        let invoked = router.dispatch("x", &json!({}));

        assert_eq!(invoked, 2);
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
        assert_eq!(router.stats().handler_panics, 1);
    }

    #[test]
    fn test_registration_during_dispatch_waits_for_next_event() {
        let router = Arc::new(EventRouter::new());
        let (log, make) = recorder();

        let router_inner = router.clone();
        let late = make("late");
        let late_slot = Arc::new(Mutex::new(Some(late)));
        router.on("x", move |_| {
            if let Some(handler) = late_slot.lock().unwrap().take() {
                router_inner.on("x", move |v| handler(v));
            }
        });

        assert_eq!(router.dispatch("x", &json!({})), 1);
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(router.dispatch("x", &json!({})), 2);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_dispatch_without_handlers() {
        let router = EventRouter::new();
        assert_eq!(router.dispatch("unknown", &json!({})), 0);
        assert_eq!(router.stats().events_dispatched, 1);
    }

    #[test]
    fn test_handler_receives_payload() {
        let router = EventRouter::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        router.on("session_integrity", move |v: &Value| {
            *seen_clone.lock().unwrap() = Some(v.clone());
        });
        router.dispatch("session_integrity", &json!({"integrity_score": 0.4}));

        let payload = seen.lock().unwrap().clone().unwrap();
        assert_eq!(payload["integrity_score"], 0.4);
    }
}
