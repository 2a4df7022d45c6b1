// ── Open-channel phase ──
//
// Runs while a connection is up: reads frames, writes queued messages,
// probes liveness, and decides what follows once the channel closes.

use futures_util::{SinkExt, StreamExt};

use trajeto_api::websocket::FrameSink;
use trajeto_api::{ABNORMAL_CLOSURE, Connection, Frame, NORMAL_CLOSURE, OutboundMessage};

use crate::dispatch::Outcome;
use crate::event::ClientEvent;
use crate::state::ConnectionState;

use super::heartbeat::{HEARTBEAT_TIMEOUT_CODE, HeartbeatMonitor, Probe};
use super::{Command, Session, Step, close, handshake};

impl Session {
    pub(super) async fn run_connection(&mut self, connection: Connection) -> Step {
        let Connection {
            mut sink,
            mut stream,
        } = connection;

        // Any success after a failure or a lost channel is a reconnection.
        let reconnected = self.connected_once || self.recovering || self.policy.attempt() > 0;
        let left_fallback = std::mem::take(&mut self.polling);
        self.connected_once = true;
        self.recovering = false;
        self.policy.reset();
        self.shared.stats.record_connected();
        if reconnected {
            self.shared.stats.record_reconnection();
        }

        self.shared.set_state(ConnectionState::Connected);
        tracing::info!(reconnected, "Real-time channel open");
        self.shared.emit(ClientEvent::Connected { reconnected });
        if left_fallback {
            tracing::info!("Fallback polling stopped");
            self.shared.emit(ClientEvent::FallbackStopped);
        }
        self.report_initial(true);

        let identify = handshake::identify_message(&self.config, self.shared.notifier.as_ref());
        if let Err(message) = self.write(&mut sink, &identify).await {
            return self.connection_lost(Some(ABNORMAL_CLOSURE), message);
        }

        let mut heartbeat = HeartbeatMonitor::new(self.config.heartbeat_interval);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    close(&mut sink, NORMAL_CLOSURE, "client disconnect").await;
                    return Step::Stop;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => match self.dispatcher.handle_text(&text) {
                        Outcome::Continue => {}
                        Outcome::Pong => heartbeat.acknowledge(),
                        Outcome::Reply(reply) => {
                            if let Err(message) = self.write(&mut sink, &reply).await {
                                return self.connection_lost(Some(ABNORMAL_CLOSURE), message);
                            }
                        }
                        Outcome::AuthFailed { reason } => {
                            handshake::reject(&self.shared, reason.clone());
                            close(&mut sink, NORMAL_CLOSURE, "authentication failed").await;
                            return self.terminate(reason);
                        }
                        Outcome::ForceDisconnect { reason } => {
                            tracing::warn!(reason = %reason, "Server forced disconnect");
                            close(&mut sink, NORMAL_CLOSURE, "forced disconnect").await;
                            return self.terminate(reason);
                        }
                    },
                    Some(Ok(Frame::Close { code, reason })) => {
                        tracing::info!(code, reason = %reason, "Close frame received");
                        if code == NORMAL_CLOSURE {
                            self.shared.emit(ClientEvent::Disconnected {
                                code: Some(code),
                                reason: reason.clone(),
                            });
                            return Step::Degraded {
                                reason: format!("server closed the channel: {reason}"),
                            };
                        }
                        return self.connection_lost(Some(code), reason);
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Real-time channel error");
                        self.shared.stats.record_error();
                        self.shared.emit(ClientEvent::Error { message: e.to_string() });
                        return self.connection_lost(Some(ABNORMAL_CLOSURE), e.to_string());
                    }
                    None => {
                        tracing::info!("Real-time channel stream ended");
                        return self.connection_lost(Some(ABNORMAL_CLOSURE), "stream ended".into());
                    }
                },
                Some(text) = self.outbound.recv() => {
                    if let Err(message) = self.write_text(&mut sink, text).await {
                        return self.connection_lost(Some(ABNORMAL_CLOSURE), message);
                    }
                }
                probe = heartbeat.tick() => match probe {
                    Probe::Ping => {
                        if let Err(message) = self.write(&mut sink, &OutboundMessage::ping()).await {
                            return self.connection_lost(Some(ABNORMAL_CLOSURE), message);
                        }
                    }
                    Probe::Stale => {
                        tracing::warn!(
                            interval_ms = u64::try_from(self.config.heartbeat_interval.as_millis())
                                .unwrap_or(u64::MAX),
                            "Heartbeat timed out"
                        );
                        close(&mut sink, HEARTBEAT_TIMEOUT_CODE, "heartbeat timeout").await;
                        return self.connection_lost(
                            Some(HEARTBEAT_TIMEOUT_CODE),
                            "heartbeat timeout".into(),
                        );
                    }
                },
                Some(Command::Reconnect) = self.commands.recv() => {
                    tracing::debug!("Already connected, ignoring reconnect request");
                }
                toast = self.dispatcher.expired_toast() => self.dispatcher.dismiss(toast),
            }
        }
    }

    /// Unplanned loss of the channel: report it and enter backoff.
    fn connection_lost(&mut self, code: Option<u16>, reason: String) -> Step {
        self.shared.emit(ClientEvent::Disconnected {
            code,
            reason: reason.clone(),
        });
        self.retry_or_degrade(reason)
    }

    /// Intentional server-side end of the session. No retry.
    fn terminate(&mut self, reason: String) -> Step {
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.emit(ClientEvent::Disconnected {
            code: Some(NORMAL_CLOSURE),
            reason,
        });
        Step::Stop
    }

    async fn write(&mut self, sink: &mut FrameSink, message: &OutboundMessage) -> Result<(), String> {
        match message.to_text() {
            Ok(text) => self.write_text(sink, text).await,
            Err(e) => {
                // Not a channel failure; the message is just dropped.
                tracing::error!(error = %e, "Failed to encode outbound message");
                self.shared.stats.record_error();
                Ok(())
            }
        }
    }

    async fn write_text(&mut self, sink: &mut FrameSink, text: String) -> Result<(), String> {
        match sink.send(Frame::Text(text)).await {
            Ok(()) => {
                self.shared.stats.record_sent();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write to real-time channel");
                self.shared.stats.record_error();
                Err(e.to_string())
            }
        }
    }
}
