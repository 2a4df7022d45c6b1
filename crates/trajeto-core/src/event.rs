// ── Client events ──
//
// Closed set of event kinds plus a typed payload per kind. String names
// (`"connected"`, `"notification:embarque"`, ...) stay parseable so UI code
// can still register handlers at runtime.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use trajeto_api::Notification;

const NOTIFICATION_PREFIX: &str = "notification:";

/// What a subscriber registers for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    Message,
    /// Every notification, whatever its type.
    Notification,
    /// Notifications of one type only (`notification:<type>`).
    NotificationOf(String),
    AuthSuccess,
    AuthFailed,
    Maintenance,
    UpdateAvailable,
    FallbackStarted,
    FallbackStopped,
}

impl EventKind {
    pub fn notification_of(kind: impl Into<String>) -> Self {
        Self::NotificationOf(kind.into())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Message => "message",
            Self::Notification => "notification",
            Self::NotificationOf(kind) => return write!(f, "{NOTIFICATION_PREFIX}{kind}"),
            Self::AuthSuccess => "auth_success",
            Self::AuthFailed => "auth_failed",
            Self::Maintenance => "maintenance",
            Self::UpdateAvailable => "update_available",
            Self::FallbackStarted => "fallback_started",
            Self::FallbackStopped => "fallback_stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown event name '{0}'")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = s.strip_prefix(NOTIFICATION_PREFIX) {
            if kind.is_empty() {
                return Err(UnknownEvent(s.to_owned()));
            }
            return Ok(Self::NotificationOf(kind.to_owned()));
        }
        Ok(match s {
            "connected" => Self::Connected,
            "disconnected" => Self::Disconnected,
            "error" => Self::Error,
            "message" => Self::Message,
            "notification" => Self::Notification,
            "auth_success" => Self::AuthSuccess,
            "auth_failed" => Self::AuthFailed,
            "maintenance" => Self::Maintenance,
            "update_available" => Self::UpdateAvailable,
            "fallback_started" => Self::FallbackStarted,
            "fallback_stopped" => Self::FallbackStopped,
            _ => return Err(UnknownEvent(s.to_owned())),
        })
    }
}

/// An event delivered to subscribers and the broadcast stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { reconnected: bool },
    Disconnected { code: Option<u16>, reason: String },
    Error { message: String },
    /// Every successfully parsed inbound envelope, before classification.
    Message(Arc<Value>),
    Notification(Arc<Notification>),
    AuthSuccess(Arc<Value>),
    AuthFailed { reason: String },
    Maintenance(Arc<Value>),
    UpdateAvailable(Arc<Value>),
    FallbackStarted,
    FallbackStopped,
}

impl ClientEvent {
    /// The generic kind this event is published under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Error { .. } => EventKind::Error,
            Self::Message(_) => EventKind::Message,
            Self::Notification(_) => EventKind::Notification,
            Self::AuthSuccess(_) => EventKind::AuthSuccess,
            Self::AuthFailed { .. } => EventKind::AuthFailed,
            Self::Maintenance(_) => EventKind::Maintenance,
            Self::UpdateAvailable(_) => EventKind::UpdateAvailable,
            Self::FallbackStarted => EventKind::FallbackStarted,
            Self::FallbackStopped => EventKind::FallbackStopped,
        }
    }

    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            Self::Notification(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in [
            "connected",
            "disconnected",
            "error",
            "message",
            "notification",
            "notification:embarque",
            "auth_success",
            "auth_failed",
            "maintenance",
            "update_available",
            "fallback_started",
            "fallback_stopped",
        ] {
            let kind: EventKind = name.parse().unwrap();
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn typed_notification_kind() {
        assert_eq!(
            "notification:desembarque".parse::<EventKind>(),
            Ok(EventKind::notification_of("desembarque"))
        );
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "conected".parse::<EventKind>(),
            Err(UnknownEvent("conected".into()))
        );
        assert!("notification:".parse::<EventKind>().is_err());
    }
}
