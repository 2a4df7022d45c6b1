// ── Real-time client facade ──
//
// The single entry point UI code talks to. Owns the shared state and at
// most one session task; every public call is non-blocking except
// `initialize` (which waits for the first connection attempt) and
// `disconnect` (which waits for the task to stop).

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use trajeto_api::websocket::ensure_ws_scheme;
use trajeto_api::{
    Connector, HttpNotificationSource, NORMAL_CLOSURE, NotificationSource, WebSocketConnector,
    connection_url,
};

use crate::config::{ClientConfig, ConfigOverrides};
use crate::error::CoreError;
use crate::event::{ClientEvent, EventKind, UnknownEvent};
use crate::history::{HistoryEntry, HistoryStore, MemoryHistoryStore, NotificationHistory};
use crate::notifier::{NoopNotifier, Notifier, Permission};
use crate::registry::SubscriptionId;
use crate::session::{Command, Session, SessionLink, SessionParts};
use crate::shared::Shared;
use crate::state::ConnectionState;
use crate::stats::StatsSnapshot;

// ── Builder ──────────────────────────────────────────────────────────

/// Collaborators for a [`RealtimeClient`]. Anything left unset gets the
/// production default: WebSocket connector, HTTP polling derived from the
/// server URL, no-op notifier, in-memory history.
pub struct RealtimeClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    source: Option<Arc<dyn NotificationSource>>,
    notifier: Arc<dyn Notifier>,
    history: Box<dyn HistoryStore>,
}

impl RealtimeClientBuilder {
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_notification_source(mut self, source: Arc<dyn NotificationSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_history_store(mut self, store: Box<dyn HistoryStore>) -> Self {
        self.history = store;
        self
    }

    pub fn build(self) -> RealtimeClient {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new(self.config.user_agent.clone())));
        let shared = Arc::new(Shared::new(
            NotificationHistory::new(self.history),
            self.notifier,
        ));

        RealtimeClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                shared,
                connector,
                source: self.source,
                link: ArcSwapOption::empty(),
                session: Mutex::new(None),
            }),
        }
    }
}

// ── RealtimeClient ───────────────────────────────────────────────────

/// Real-time notification client.
///
/// Cheaply cloneable; clones share one session. Dropping the last clone
/// cancels the session task.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    source: Option<Arc<dyn NotificationSource>>,
    link: ArcSwapOption<SessionLink>,
    session: Mutex<Option<SessionTask>>,
}

struct SessionTask {
    guard: DropGuard,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("server_url", &self.inner.config.server_url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RealtimeClient {
    pub fn builder(config: ClientConfig) -> RealtimeClientBuilder {
        RealtimeClientBuilder {
            config,
            connector: None,
            source: None,
            notifier: Arc::new(NoopNotifier),
            history: Box::new(MemoryHistoryStore::default()),
        }
    }

    /// Client with all default collaborators. Does NOT connect; call
    /// [`initialize()`](Self::initialize).
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a session with `token`, replacing any running one.
    ///
    /// Resolves once the first connection attempt settles: `Ok(true)` if
    /// the channel opened, `Ok(false)` if it failed (retries continue in
    /// the background).
    pub async fn initialize(&self, token: impl Into<String>) -> Result<bool, CoreError> {
        self.initialize_with(token, &ConfigOverrides::default()).await
    }

    pub async fn initialize_with(
        &self,
        token: impl Into<String>,
        overrides: &ConfigOverrides,
    ) -> Result<bool, CoreError> {
        let token: String = token.into();
        if token.trim().is_empty() {
            return Err(CoreError::MissingToken);
        }

        let config = self.inner.config.merged(overrides);
        config.validate()?;
        ensure_ws_scheme(&config.server_url)?;

        let source = match self.inner.source {
            Some(ref source) => Some(Arc::clone(source)),
            None if config.fallback_enabled => {
                let http = HttpNotificationSource::new(config.poll_endpoint()?, &config.transport())?;
                Some(Arc::new(http) as Arc<dyn NotificationSource>)
            }
            None => None,
        };

        // Held until the new link and task are both in place, so concurrent
        // calls cannot leave the link pointing at a cancelled session.
        let mut slot = self.inner.session.lock().await;
        self.stop(&mut slot).await;

        tracing::info!(server = %config.server_url, "Starting real-time session");
        let url = connection_url(&config.server_url, &token);
        let cancel = CancellationToken::new();
        let (session, link, initial) = Session::new(SessionParts {
            shared: Arc::clone(&self.inner.shared),
            config,
            url,
            token: SecretString::from(token),
            connector: Arc::clone(&self.inner.connector),
            source,
            cancel: cancel.clone(),
        });

        let handle = tokio::spawn(session.run());
        self.inner.link.store(Some(Arc::new(link)));
        *slot = Some(SessionTask {
            guard: cancel.drop_guard(),
            handle,
        });
        drop(slot);

        Ok(initial.await.unwrap_or(false))
    }

    /// Stop the session. Safe to call in any state, any number of times.
    pub async fn disconnect(&self) {
        let mut slot = self.inner.session.lock().await;
        self.stop(&mut slot).await;
    }

    /// Tear down the task in `slot`, if any. Callers hold the session lock.
    async fn stop(&self, slot: &mut Option<SessionTask>) {
        self.inner.link.store(None);
        let Some(task) = slot.take() else {
            return;
        };

        let was_live = self.state() != ConnectionState::Disconnected;
        task.guard.disarm().cancel();
        if let Err(e) = task.handle.await {
            tracing::warn!(error = %e, "Session task ended abnormally");
        }

        self.inner.shared.history.flush().await;
        self.inner.shared.user.store(None);
        self.inner.shared.set_state(ConnectionState::Disconnected);
        if was_live {
            self.inner.shared.emit(ClientEvent::Disconnected {
                code: Some(NORMAL_CLOSURE),
                reason: "client disconnect".into(),
            });
        }
        tracing::info!("Real-time session stopped");
    }

    /// Connect now: skips a pending backoff, or leaves fallback polling.
    /// Returns `false` when no session is running.
    pub fn reconnect(&self) -> bool {
        self.inner
            .link
            .load()
            .as_ref()
            .is_some_and(|link| link.commands.try_send(Command::Reconnect).is_ok())
    }

    /// Queue `message` for the open channel. Returns `false` unless connected.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        let Some(link) = self.inner.link.load_full() else {
            return false;
        };
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot encode outbound message");
                return false;
            }
        };
        match link.outbound.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Outbound message not queued");
                false
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.shared.registry.on(kind, handler)
    }

    /// [`on`](Self::on) with the event's string name, e.g. `"notification:embarque"`.
    pub fn on_named<F>(&self, name: &str, handler: F) -> Result<SubscriptionId, UnknownEvent>
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        Ok(self.on(name.parse()?, handler))
    }

    pub fn off(&self, kind: &EventKind, id: SubscriptionId) -> bool {
        self.inner.shared.registry.off(kind, id)
    }

    /// Every event except the typed `notification:<type>` copies.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.shared.subscribe_events()
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.subscribe_state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn get_stats(&self) -> StatsSnapshot {
        self.inner.shared.stats.snapshot(self.state())
    }

    /// User data from the last `auth_success`, cleared on rejection or disconnect.
    pub fn user(&self) -> Option<Arc<Value>> {
        self.inner.shared.user.load_full()
    }

    // ── History ──────────────────────────────────────────────────────

    pub fn history(&self) -> Arc<Vec<HistoryEntry>> {
        self.inner.shared.history.entries()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.shared.history.unread_count()
    }

    pub fn mark_read(&self, id: Uuid) -> bool {
        self.inner.shared.history.mark_read(id)
    }

    pub fn mark_all_read(&self) -> usize {
        self.inner.shared.history.mark_all_read()
    }

    pub fn clear_history(&self) {
        self.inner.shared.history.clear();
    }

    // ── Platform ─────────────────────────────────────────────────────

    /// Ask the notifier for permission. Returns whether it was granted.
    pub fn request_notification_permission(&self) -> bool {
        let permission = self.inner.shared.notifier.request_permission();
        tracing::debug!(%permission, "Notification permission");
        permission == Permission::Granted
    }
}
