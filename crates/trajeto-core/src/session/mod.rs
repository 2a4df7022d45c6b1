// ── Session task ──
//
// One tokio task per `initialize()`. It owns the connection, the
// reconnect budget, the heartbeat and the fallback poller, and walks
// them as a single state machine so no two phases ever run at once:
//
//   Connect ──ok──▶ (channel.rs) ──abnormal close──▶ Backoff ──▶ Connect
//      │                 │                              │
//      └──fail──▶ Backoff│◀─────────────────────────────┘
//                        └─normal close / budget spent─▶ Degraded (fallback.rs)
//
// Cancellation is checked first in every `select!`.

mod channel;
mod fallback;
pub(crate) mod handshake;
pub(crate) mod heartbeat;
pub(crate) mod reconnect;

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use secrecy::SecretString;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use trajeto_api::websocket::{self, FrameSink};
use trajeto_api::{Connection, Connector, Frame, NotificationSource};

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::event::ClientEvent;
use crate::shared::Shared;
use crate::state::ConnectionState;

use self::reconnect::ReconnectPolicy;

const COMMAND_CHANNEL_SIZE: usize = 8;
const OUTBOUND_CHANNEL_SIZE: usize = 64;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Connect now, skipping any pending backoff or leaving fallback.
    Reconnect,
}

/// The facade's handle into a running session.
#[derive(Debug, Clone)]
pub(crate) struct SessionLink {
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) outbound: mpsc::Sender<String>,
}

enum Step {
    Connect,
    Backoff { attempt: u32, delay: Duration },
    Degraded { reason: String },
    Stop,
}

pub(crate) struct Session {
    shared: Arc<Shared>,
    config: ClientConfig,
    url: Url,
    token: SecretString,
    connector: Arc<dyn Connector>,
    source: Option<Arc<dyn NotificationSource>>,
    cancel: CancellationToken,
    commands: mpsc::Receiver<Command>,
    outbound: mpsc::Receiver<String>,
    dispatcher: Dispatcher,
    policy: ReconnectPolicy,
    connected_once: bool,
    /// Set on entering the degraded phase, cleared once a channel opens.
    recovering: bool,
    polling: bool,
    initial: Option<oneshot::Sender<bool>>,
}

pub(crate) struct SessionParts {
    pub(crate) shared: Arc<Shared>,
    pub(crate) config: ClientConfig,
    pub(crate) url: Url,
    pub(crate) token: SecretString,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) source: Option<Arc<dyn NotificationSource>>,
    pub(crate) cancel: CancellationToken,
}

impl Session {
    /// Build a session plus the link the facade talks to it through and a
    /// receiver resolving with the outcome of the first connection attempt.
    pub(crate) fn new(parts: SessionParts) -> (Self, SessionLink, oneshot::Receiver<bool>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        let (initial_tx, initial_rx) = oneshot::channel();

        let session = Self {
            dispatcher: Dispatcher::new(Arc::clone(&parts.shared), parts.config.debug),
            policy: ReconnectPolicy::new(
                parts.config.reconnect_interval,
                parts.config.max_reconnect_attempts,
            ),
            shared: parts.shared,
            config: parts.config,
            url: parts.url,
            token: parts.token,
            connector: parts.connector,
            source: parts.source,
            cancel: parts.cancel,
            commands: command_rx,
            outbound: outbound_rx,
            connected_once: false,
            recovering: false,
            polling: false,
            initial: Some(initial_tx),
        };
        let link = SessionLink {
            commands: command_tx,
            outbound: outbound_tx,
        };
        (session, link, initial_rx)
    }

    pub(crate) async fn run(mut self) {
        let mut step = Step::Connect;
        loop {
            step = match step {
                Step::Connect => self.connect().await,
                Step::Backoff { attempt, delay } => self.backoff(attempt, delay).await,
                Step::Degraded { reason } => self.degraded(reason).await,
                Step::Stop => break,
            };
        }

        self.report_initial(false);
        self.dispatcher.dismiss_pending();
        let dropped = self.drain_outbound();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded unsent outbound messages");
        }
        tracing::debug!("Session task exiting");
    }

    // ── Phases ───────────────────────────────────────────────────────

    async fn connect(&mut self) -> Step {
        if self.policy.attempt() == 0 {
            self.shared.set_state(ConnectionState::Connecting);
        }
        match self.open().await {
            Ok(Some(connection)) => self.run_connection(connection).await,
            Ok(None) => Step::Stop,
            Err(message) => {
                self.report_initial(false);
                self.retry_or_degrade(message)
            }
        }
    }

    async fn backoff(&mut self, attempt: u32, delay: Duration) -> Step {
        self.shared
            .set_state(ConnectionState::Reconnecting { attempt });
        tracing::info!(
            attempt,
            max_attempts = self.policy.max_attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting before reconnect"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Step::Stop,
                () = &mut sleep => return Step::Connect,
                Some(Command::Reconnect) = self.commands.recv() => {
                    tracing::info!(attempt, "Manual reconnect, skipping backoff");
                    return Step::Connect;
                }
                Some(_) = self.outbound.recv() => {
                    tracing::debug!("Dropping outbound message while reconnecting");
                }
                toast = self.dispatcher.expired_toast() => self.dispatcher.dismiss(toast),
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// One connection attempt. `Ok(None)` means the session was cancelled
    /// mid-handshake; `Err` carries the failure already logged and counted.
    async fn open(&mut self) -> Result<Option<Connection>, String> {
        self.shared.stats.record_attempt();

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(None),
            result = websocket::open(self.connector.as_ref(), &self.url) => result,
        };

        match result {
            Ok(connection) => Ok(Some(connection)),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %e, "Connection attempt failed");
                self.shared.stats.record_error();
                self.shared.emit(ClientEvent::Error {
                    message: message.clone(),
                });
                Err(message)
            }
        }
    }

    /// Schedule the next attempt, or degrade once the budget is spent.
    fn retry_or_degrade(&mut self, last_error: String) -> Step {
        match self.policy.next_delay() {
            Some((attempt, delay)) => Step::Backoff { attempt, delay },
            None => {
                tracing::warn!(
                    attempts = self.policy.max_attempts(),
                    last_error = %last_error,
                    "Reconnect attempts exhausted"
                );
                Step::Degraded {
                    reason: format!(
                        "gave up after {} reconnect attempts: {last_error}",
                        self.policy.max_attempts()
                    ),
                }
            }
        }
    }

    fn report_initial(&mut self, connected: bool) {
        if let Some(tx) = self.initial.take() {
            // The facade may have stopped waiting.
            let _ = tx.send(connected);
        }
    }

    fn drain_outbound(&mut self) -> usize {
        self.outbound.close();
        let mut dropped = 0;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// Best-effort close frame; a dead peer must not stall shutdown.
async fn close(sink: &mut FrameSink, code: u16, reason: &str) {
    let frame = Frame::close(code, reason);
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(frame)).await {
        Ok(Ok(())) => tracing::debug!(code, reason, "Sent close frame"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Close frame not delivered"),
        Err(_) => tracing::debug!("Close frame timed out"),
    }
}
