// ── Degraded phase ──
//
// Entered when the channel cannot be kept up. With a notification source
// and fallback enabled, polls it on a fixed period until a manual
// reconnect reopens the channel; otherwise idles until told to retry.

use tokio::time::MissedTickBehavior;

use trajeto_api::NotificationSource;

use crate::event::ClientEvent;
use crate::state::ConnectionState;

use super::{Command, Session, Step};

impl Session {
    pub(super) async fn degraded(&mut self, reason: String) -> Step {
        self.recovering = true;
        let source = self.source.clone().filter(|_| self.config.fallback_enabled);
        let Some(source) = source else {
            return self.idle(reason).await;
        };

        self.polling = true;
        self.shared.set_state(ConnectionState::FallbackActive);
        tracing::warn!(
            reason = %reason,
            interval_ms = u64::try_from(self.config.fallback_interval.as_millis()).unwrap_or(u64::MAX),
            "Real-time channel unavailable, polling for notifications"
        );
        self.shared.emit(ClientEvent::FallbackStarted);

        // First tick completes immediately.
        let mut poll = tokio::time::interval(self.config.fallback_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Step::Stop,
                Some(Command::Reconnect) = self.commands.recv() => {
                    tracing::info!("Manual reconnect requested, leaving fallback");
                    match self.open().await {
                        Ok(Some(connection)) => return self.run_connection(connection).await,
                        Ok(None) => return Step::Stop,
                        Err(_) => tracing::info!("Still unreachable, polling continues"),
                    }
                }
                _ = poll.tick() => self.poll_once(source.as_ref()).await,
                Some(_) = self.outbound.recv() => {
                    tracing::debug!("Dropping outbound message while polling");
                }
                toast = self.dispatcher.expired_toast() => self.dispatcher.dismiss(toast),
            }
        }
    }

    /// No fallback: stay disconnected until a manual reconnect.
    async fn idle(&mut self, reason: String) -> Step {
        tracing::warn!(reason = %reason, "Real-time channel unavailable and fallback disabled");
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.emit(ClientEvent::Error { message: reason });

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Step::Stop,
                Some(Command::Reconnect) = self.commands.recv() => {
                    self.policy.reset();
                    return Step::Connect;
                }
                Some(_) = self.outbound.recv() => {
                    tracing::debug!("Dropping outbound message while disconnected");
                }
                toast = self.dispatcher.expired_toast() => self.dispatcher.dismiss(toast),
            }
        }
    }

    async fn poll_once(&mut self, source: &dyn NotificationSource) {
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return,
            result = source.fetch(&self.token) => result,
        };

        match result {
            Ok(notifications) => {
                tracing::debug!(count = notifications.len(), "Fallback poll complete");
                for notification in notifications {
                    self.dispatcher.deliver(notification);
                }
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(error = %e, "Fallback poll failed, retrying next tick");
                } else {
                    tracing::error!(
                        error = %e,
                        unauthorized = e.is_unauthorized(),
                        "Fallback poll rejected"
                    );
                }
                self.shared.stats.record_error();
            }
        }
    }
}
