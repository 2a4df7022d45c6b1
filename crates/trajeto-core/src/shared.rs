// ── State shared between the facade and the session task ──

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::event::{ClientEvent, EventKind};
use crate::history::NotificationHistory;
use crate::notifier::Notifier;
use crate::registry::EventRegistry;
use crate::state::ConnectionState;
use crate::stats::Stats;

const EVENT_CHANNEL_SIZE: usize = 256;

pub(crate) struct Shared {
    pub(crate) registry: EventRegistry,
    pub(crate) stats: Stats,
    pub(crate) history: NotificationHistory,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) user: ArcSwapOption<Value>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ClientEvent>,
}

impl Shared {
    pub(crate) fn new(history: NotificationHistory, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            registry: EventRegistry::new(),
            stats: Stats::default(),
            history,
            notifier,
            user: ArcSwapOption::empty(),
            state,
            events,
        }
    }

    /// Publish to subscribers of the event's own kind and to the broadcast stream.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let kind = event.kind();
        self.registry.emit(&kind, &event);
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Publish to subscribers of `kind` only.
    pub(crate) fn emit_as(&self, kind: &EventKind, event: &ClientEvent) {
        self.registry.emit(kind, event);
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!(state = %next, "Connection state changed");
        }
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}
