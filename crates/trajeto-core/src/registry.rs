// ── Event subscriber registry ──
//
// Maps each `EventKind` to its handlers in registration order. Emission
// runs handlers synchronously, one at a time; a panicking handler is
// logged and skipped so its siblings still run.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::event::{ClientEvent, EventKind};

/// Callback invoked for each matching event.
pub type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Handle returned by [`EventRegistry::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventRegistry {
    next_id: AtomicU64,
    subscribers: DashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("kinds", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. Handlers run in registration order.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one registration. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: &EventKind, id: SubscriptionId) -> bool {
        let removed = match self.subscribers.get_mut(kind) {
            Some(mut handlers) => {
                let before = handlers.len();
                handlers.retain(|(sub, _)| *sub != id);
                handlers.len() != before
            }
            None => false,
        };
        self.subscribers.remove_if(kind, |_, handlers| handlers.is_empty());
        removed
    }

    /// Deliver `event` to every handler registered under `kind`.
    ///
    /// Returns how many handlers completed without panicking.
    pub fn emit(&self, kind: &EventKind, event: &ClientEvent) -> usize {
        // Snapshot so handlers may (un)subscribe without deadlocking the map.
        let handlers: Vec<Handler> = match self.subscribers.get(kind) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::error!(
                        event = %kind,
                        panic = panic_message(panic.as_ref()),
                        "Event subscriber panicked"
                    );
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: &EventKind) -> usize {
        self.subscribers.get(kind).map_or(0, |list| list.len())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &'static str| -> Handler {
                let log = Arc::clone(&log);
                Arc::new(move |_: &ClientEvent| log.lock().unwrap().push(tag))
            }
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        for tag in ["first", "second", "third"] {
            let handler = make(tag);
            registry.on(EventKind::Connected, move |e| handler(e));
        }

        let delivered = registry.emit(
            &EventKind::Connected,
            &ClientEvent::Connected { reconnected: false },
        );

        assert_eq!(delivered, 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_siblings() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        registry.on(EventKind::FallbackStarted, |_| panic!("subscriber bug"));
        let handler = make("after");
        registry.on(EventKind::FallbackStarted, move |e| handler(e));

        let delivered = registry.emit(&EventKind::FallbackStarted, &ClientEvent::FallbackStarted);

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn off_removes_only_that_subscription() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        let a = make("a");
        let b = make("b");
        let first = registry.on(EventKind::Error, move |e| a(e));
        registry.on(EventKind::Error, move |e| b(e));

        assert!(registry.off(&EventKind::Error, first));
        assert!(!registry.off(&EventKind::Error, first));
        assert!(!registry.off(&EventKind::Connected, first));

        registry.emit(
            &EventKind::Error,
            &ClientEvent::Error {
                message: "x".into(),
            },
        );
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert_eq!(registry.subscriber_count(&EventKind::Error), 1);
    }

    #[test]
    fn kinds_are_isolated() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();

        let typed = make("embarque");
        registry.on(EventKind::notification_of("embarque"), move |e| typed(e));

        let delivered = registry.emit(&EventKind::notification_of("atraso"), &ClientEvent::FallbackStopped);

        assert_eq!(delivered, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_may_subscribe_during_emit() {
        let registry = Arc::new(EventRegistry::new());
        let inner = Arc::clone(&registry);

        registry.on(EventKind::Connected, move |_| {
            inner.on(EventKind::Connected, |_| {});
        });

        registry.emit(&EventKind::Connected, &ClientEvent::Connected { reconnected: true });
        assert_eq!(registry.subscriber_count(&EventKind::Connected), 2);
    }
}
