// ── Inbound message dispatch ──
//
// Classifies each text frame, fans events out to subscribers and runs
// the per-notification side effects (toast, platform notification,
// sound, vibration, history). Owned by the session task.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::time::DelayQueue;

use trajeto_api::{InboundMessage, Notification, OutboundMessage, SystemAction};

use crate::event::{ClientEvent, EventKind};
use crate::notifier::{Permission, ToastId, VIBRATION_PATTERN};
use crate::session::handshake;
use crate::shared::Shared;

/// How long a non-critical toast stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(5);

/// What the session must do after a frame was dispatched.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Continue,
    Reply(OutboundMessage),
    Pong,
    AuthFailed { reason: String },
    ForceDisconnect { reason: String },
}

pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    toasts: DelayQueue<ToastId>,
    pending_toasts: HashSet<ToastId>,
    next_toast: u64,
    debug: bool,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>, debug: bool) -> Self {
        Self {
            shared,
            toasts: DelayQueue::new(),
            pending_toasts: HashSet::new(),
            next_toast: 0,
            debug,
        }
    }

    pub(crate) fn handle_text(&mut self, text: &str) -> Outcome {
        self.shared.stats.record_received();
        if self.debug {
            tracing::info!(frame = text, "Inbound frame");
        } else {
            tracing::trace!(frame = text, "Inbound frame");
        }

        let (raw, message) = match InboundMessage::parse(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed frame");
                self.shared.stats.record_error();
                return Outcome::Continue;
            }
        };

        self.shared.emit(ClientEvent::Message(Arc::new(raw)));

        match message {
            InboundMessage::Notification(notification) => {
                self.deliver(notification);
                Outcome::Continue
            }
            InboundMessage::System { action, data } => match action {
                SystemAction::Maintenance => {
                    self.shared.emit(ClientEvent::Maintenance(Arc::new(data)));
                    Outcome::Continue
                }
                SystemAction::UpdateAvailable => {
                    self.shared
                        .emit(ClientEvent::UpdateAvailable(Arc::new(data)));
                    Outcome::Continue
                }
                SystemAction::ForceDisconnect => Outcome::ForceDisconnect {
                    reason: data["reason"]
                        .as_str()
                        .or_else(|| data["message"].as_str())
                        .unwrap_or("server requested disconnect")
                        .to_owned(),
                },
                SystemAction::Other(action) => {
                    tracing::debug!(action = %action, "Ignoring unhandled system action");
                    Outcome::Continue
                }
            },
            InboundMessage::AuthSuccess(data) => {
                handshake::accept(&self.shared, data);
                Outcome::Continue
            }
            InboundMessage::AuthFailed { reason, .. } => Outcome::AuthFailed { reason },
            InboundMessage::Ping => Outcome::Reply(OutboundMessage::pong()),
            InboundMessage::Pong => Outcome::Pong,
            InboundMessage::Unknown { kind, .. } => {
                tracing::warn!(kind = %kind, "Unknown message type");
                Outcome::Continue
            }
        }
    }

    /// Publish one notification and run its side effects.
    ///
    /// Typed subscribers (`notification:<type>`) run before generic ones.
    pub(crate) fn deliver(&mut self, notification: Notification) {
        let notification = Arc::new(notification);
        let critical = notification.priority.is_critical();
        let event = ClientEvent::Notification(Arc::clone(&notification));

        self.shared
            .emit_as(&EventKind::notification_of(&notification.kind), &event);
        self.shared.emit(event);

        let notifier = &self.shared.notifier;

        let toast = ToastId(self.next_toast);
        self.next_toast += 1;
        notifier.show_toast(toast, &notification);
        if !critical {
            self.toasts.insert(toast, TOAST_TTL);
            self.pending_toasts.insert(toast);
        }

        if notifier.permission() == Permission::Granted {
            if let Err(e) = notifier.show_platform_notification(&notification, critical) {
                tracing::debug!(error = %e, "Platform notification failed");
            }
        }

        if let Err(e) = notifier.play_sound(notification.priority) {
            tracing::debug!(error = %e, "Notification sound unavailable");
        }

        if critical {
            if let Err(e) = notifier.vibrate(&VIBRATION_PATTERN) {
                tracing::debug!(error = %e, "Vibration unavailable");
            }
        }

        self.shared.history.push(notification.as_ref().clone());
    }

    /// Resolves when the next toast expires. Pending forever while none are queued.
    pub(crate) async fn expired_toast(&mut self) -> ToastId {
        match self.toasts.next().await {
            Some(expired) => {
                let toast = expired.into_inner();
                self.pending_toasts.remove(&toast);
                toast
            }
            None => std::future::pending().await,
        }
    }

    pub(crate) fn dismiss(&self, toast: ToastId) {
        self.shared.notifier.dismiss_toast(toast);
    }

    /// Dismiss every toast still waiting for its timer.
    pub(crate) fn dismiss_pending(&mut self) {
        for toast in self.pending_toasts.drain() {
            self.shared.notifier.dismiss_toast(toast);
        }
        self.toasts.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use trajeto_api::Priority;

    use crate::history::NotificationHistory;
    use crate::notifier::{Notifier, NotifierError};
    use crate::state::ConnectionState;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        permission: Option<Permission>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Notifier for Recorder {
        fn permission(&self) -> Permission {
            self.permission.unwrap_or_default()
        }
        fn show_toast(&self, id: ToastId, _n: &Notification) {
            self.record(format!("toast {}", id.0));
        }
        fn dismiss_toast(&self, id: ToastId) {
            self.record(format!("dismiss {}", id.0));
        }
        fn show_platform_notification(
            &self,
            _n: &Notification,
            require_interaction: bool,
        ) -> Result<(), NotifierError> {
            self.record(format!("platform {require_interaction}"));
            Ok(())
        }
        fn play_sound(&self, priority: Priority) -> Result<(), NotifierError> {
            self.record(format!("sound {priority}"));
            Err(NotifierError("no audio device".into()))
        }
        fn vibrate(&self, pattern: &[u64]) -> Result<(), NotifierError> {
            self.record(format!("vibrate {pattern:?}"));
            Ok(())
        }
    }

    fn setup(notifier: Recorder) -> (Arc<Shared>, Arc<Recorder>, Dispatcher) {
        let notifier = Arc::new(notifier);
        let shared = Arc::new(Shared::new(
            NotificationHistory::in_memory(),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&shared), false);
        (shared, notifier, dispatcher)
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (_, _, mut dispatcher) = setup(Recorder::default());
        let outcome = dispatcher.handle_text(r#"{"type":"ping"}"#);
        assert!(matches!(outcome, Outcome::Reply(OutboundMessage::Pong { .. })));
    }

    #[tokio::test]
    async fn malformed_frame_is_counted_and_dropped() {
        let (shared, _, mut dispatcher) = setup(Recorder::default());
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        shared
            .registry
            .on(EventKind::Message, move |_| *counter.lock().unwrap() += 1);

        let outcome = dispatcher.handle_text("not json at all");

        assert!(matches!(outcome, Outcome::Continue));
        assert_eq!(*seen.lock().unwrap(), 0);
        let stats = shared.stats.snapshot(ConnectionState::Connected);
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn typed_subscribers_run_before_generic_ones() {
        let (shared, _, mut dispatcher) = setup(Recorder::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        shared.registry.on(EventKind::Notification, move |_| {
            log.lock().unwrap().push("notification");
        });
        let log = Arc::clone(&order);
        shared
            .registry
            .on(EventKind::notification_of("embarque"), move |_| {
                log.lock().unwrap().push("notification:embarque");
            });

        dispatcher.handle_text(
            r#"{"type":"notification","data":{"type":"embarque","priority":"alta","data":{"criancaId":7}}}"#,
        );

        assert_eq!(
            *order.lock().unwrap(),
            vec!["notification:embarque", "notification"]
        );
        let history = shared.history.entries();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notification.data["criancaId"], 7);
    }

    #[tokio::test]
    async fn critical_notification_stays_and_vibrates() {
        let (_, notifier, mut dispatcher) = setup(Recorder {
            permission: Some(Permission::Granted),
            ..Recorder::default()
        });

        dispatcher.deliver(Notification::new("emergencia", Priority::Critica));

        assert!(dispatcher.pending_toasts.is_empty());
        assert_eq!(
            notifier.calls(),
            vec![
                "toast 0",
                "platform true",
                "sound critica",
                "vibrate [200, 100, 200]",
            ]
        );
    }

    #[tokio::test]
    async fn platform_notification_needs_permission() {
        let (_, notifier, mut dispatcher) = setup(Recorder::default());

        dispatcher.deliver(Notification::new("atraso", Priority::Baixa));

        assert_eq!(notifier.calls(), vec!["toast 0", "sound baixa"]);
    }

    #[tokio::test(start_paused = true)]
    async fn regular_toast_expires_after_five_seconds() {
        let (_, notifier, mut dispatcher) = setup(Recorder::default());
        let started = tokio::time::Instant::now();

        dispatcher.deliver(Notification::new("embarque", Priority::Media));
        let expired = dispatcher.expired_toast().await;
        dispatcher.dismiss(expired);

        assert_eq!(expired, ToastId(0));
        assert!(started.elapsed() >= TOAST_TTL);
        assert!(notifier.calls().contains(&"dismiss 0".to_owned()));
    }

    #[tokio::test]
    async fn pending_toasts_are_dismissed_on_teardown() {
        let (_, notifier, mut dispatcher) = setup(Recorder::default());
        dispatcher.deliver(Notification::new("embarque", Priority::Alta));

        dispatcher.dismiss_pending();

        assert!(notifier.calls().contains(&"dismiss 0".to_owned()));
        assert!(dispatcher.pending_toasts.is_empty());
    }

    #[tokio::test]
    async fn system_messages() {
        let (shared, _, mut dispatcher) = setup(Recorder::default());
        let mut events = shared.subscribe_events();

        dispatcher.handle_text(r#"{"type":"system","data":{"action":"maintenance","until":"22:00"}}"#);
        let outcome = dispatcher
            .handle_text(r#"{"type":"system","data":{"action":"force_disconnect","reason":"duplicate session"}}"#);

        assert!(matches!(events.recv().await.unwrap(), ClientEvent::Message(_)));
        match events.recv().await.unwrap() {
            ClientEvent::Maintenance(data) => assert_eq!(data["until"], "22:00"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(
            matches!(outcome, Outcome::ForceDisconnect { ref reason } if reason == "duplicate session")
        );
    }

    #[tokio::test]
    async fn auth_failure_is_reported_to_the_session() {
        let (_, _, mut dispatcher) = setup(Recorder::default());
        let outcome = dispatcher.handle_text(r#"{"type":"auth_failed","data":{"error":"expired"}}"#);
        assert!(matches!(outcome, Outcome::AuthFailed { ref reason } if reason == "expired"));
    }
}
