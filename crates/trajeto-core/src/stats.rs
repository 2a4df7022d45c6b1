// ── Connection statistics ──
//
// Process-lifetime counters. They only ever go up and reset only when
// the client is rebuilt.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::state::ConnectionState;

#[derive(Debug, Default)]
pub struct Stats {
    connection_attempts: AtomicU64,
    successful_connections: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnections: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of the counters plus the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnections: u64,
    pub errors: u64,
    pub state: ConnectionState,
    /// Attempt number of a pending reconnect, `0` when none is scheduled.
    pub reconnect_attempt: u32,
}

impl Stats {
    pub(crate) fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connected(&self) {
        self.successful_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnection(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, state: ConnectionState) -> StatsSnapshot {
        StatsSnapshot {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            successful_connections: self.successful_connections.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            reconnections: self.reconnections.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            state,
            reconnect_attempt: match state {
                ConnectionState::Reconnecting { attempt } => attempt,
                _ => 0,
            },
        }
    }
}
