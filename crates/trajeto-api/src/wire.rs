//! JSON wire format for the real-time notification channel.
//!
//! Every frame is a text message carrying an envelope of the shape
//! `{ "type": "...", "data": { ... } }`. Inbound frames are classified
//! into [`InboundMessage`]; outbound frames are built from
//! [`OutboundMessage`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;

// ── Priority ─────────────────────────────────────────────────────────

/// Urgency of a notification, as labelled by the marketplace backend.
///
/// Unknown labels deserialize as [`Priority::Media`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Baixa,
    #[default]
    Media,
    Alta,
    Critica,
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        raw.trim()
            .to_ascii_lowercase()
            .parse()
            .unwrap_or_default()
    }
}

impl Priority {
    /// Critical notifications stay on screen until acknowledged.
    pub fn is_critical(self) -> bool {
        self == Self::Critica
    }
}

// ── Notification ─────────────────────────────────────────────────────

/// A typed, prioritized event delivered to the client.
///
/// `type` is the domain discriminant (`"embarque"`, `"desembarque"`,
/// `"atraso"`, ...). Fields beyond the core set are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Server timestamp; RFC 3339 or epoch milliseconds. Defaults to receipt time.
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Notification {
    /// Build a notification locally (used by tests and the CLI).
    pub fn new(kind: impl Into<String>, priority: Priority) -> Self {
        Self {
            kind: kind.into(),
            priority,
            title: None,
            message: None,
            data: Value::Null,
            timestamp: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }

    /// Text to show the user: the message, else the title, else the type.
    pub fn display_text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.kind)
    }
}

/// Anything that is not a usable timestamp falls back to receipt time.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => None,
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(|| {
        if !value.is_null() {
            tracing::debug!(timestamp = %value, "Unparseable timestamp, using receipt time");
        }
        Utc::now()
    }))
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Raw envelope every inbound frame is parsed into first.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Sub-type of a `system` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAction {
    Maintenance,
    UpdateAvailable,
    ForceDisconnect,
    Other(String),
}

impl SystemAction {
    fn from_data(data: &Value) -> Self {
        match data["action"].as_str().unwrap_or_default() {
            "maintenance" => Self::Maintenance,
            "update_available" | "update" => Self::UpdateAvailable,
            "force_disconnect" | "disconnect" => Self::ForceDisconnect,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Notification(Notification),
    System { action: SystemAction, data: Value },
    AuthSuccess(Value),
    AuthFailed { reason: String, data: Value },
    Ping,
    Pong,
    Unknown { kind: String, data: Value },
}

impl InboundMessage {
    /// Parse a text frame. Returns the raw JSON alongside the classified
    /// message so callers can surface both.
    pub fn parse(text: &str) -> Result<(Value, Self), Error> {
        let raw: Value = serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })?;
        let envelope: Envelope =
            serde_json::from_value(raw.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.to_owned(),
            })?;

        let message = match envelope.kind.as_str() {
            "notification" => {
                let notification = serde_json::from_value(envelope.data).map_err(|e| {
                    Error::Deserialization {
                        message: format!("invalid notification payload: {e}"),
                        body: text.to_owned(),
                    }
                })?;
                Self::Notification(notification)
            }
            "system" => Self::System {
                action: SystemAction::from_data(&envelope.data),
                data: envelope.data,
            },
            "auth_success" => Self::AuthSuccess(envelope.data),
            "auth_failed" => Self::AuthFailed {
                reason: auth_failure_reason(&envelope.data),
                data: envelope.data,
            },
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            _ => Self::Unknown {
                kind: envelope.kind,
                data: envelope.data,
            },
        };

        Ok((raw, message))
    }
}

fn auth_failure_reason(data: &Value) -> String {
    data["error"]
        .as_str()
        .or_else(|| data["message"].as_str())
        .or_else(|| data["reason"].as_str())
        .unwrap_or("unknown")
        .to_owned()
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Feature flags announced in the `identify` message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub notifications: bool,
    pub audio: bool,
    pub vibration: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub user_agent: String,
    pub timestamp: i64,
    pub capabilities: Capabilities,
}

/// Messages the client writes to the channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Identify { data: IdentifyPayload },
    Ping { timestamp: i64 },
    Pong { timestamp: i64 },
}

impl OutboundMessage {
    pub fn identify(user_agent: &str, capabilities: Capabilities) -> Self {
        Self::Identify {
            data: IdentifyPayload {
                user_agent: user_agent.to_owned(),
                timestamp: Utc::now().timestamp_millis(),
                capabilities,
            },
        }
    }

    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn to_text(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
