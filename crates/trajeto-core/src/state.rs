// ── Connection state ──
//
// Exactly one state is active at a time. Only the session task moves
// between states; consumers observe them through a watch channel.

use serde::Serialize;

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(tag = "state", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    FallbackActive,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// The channel is down but the client is still delivering notifications.
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::Reconnecting { .. } | Self::FallbackActive)
    }
}
