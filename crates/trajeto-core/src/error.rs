// ── Core error types ──
//
// Errors surfaced by the real-time client. Consumers never see raw
// tungstenite or reqwest failures -- the `From<trajeto_api::Error>` impl
// translates transport-layer errors into session-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Programmer errors ────────────────────────────────────────────
    #[error("No session token set -- call initialize() with a non-empty token")]
    MissingToken,

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Local state ──────────────────────────────────────────────────
    #[error("Notification history error: {message}")]
    History { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<trajeto_api::Error> for CoreError {
    fn from(err: trajeto_api::Error) -> Self {
        match err {
            trajeto_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                }
            }
            trajeto_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            trajeto_api::Error::UnsupportedScheme { scheme } => CoreError::Unsupported {
                operation: format!("real-time channel over '{scheme}'"),
            },
            trajeto_api::Error::HttpStatus { status, url } if status == 401 || status == 403 => {
                CoreError::AuthenticationFailed {
                    message: format!("HTTP {status} from {url}"),
                }
            }
            trajeto_api::Error::HttpStatus { status, url } => CoreError::ConnectionFailed {
                url,
                reason: format!("HTTP {status}"),
            },
            trajeto_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            trajeto_api::Error::WebSocketConnect(reason) | trajeto_api::Error::WebSocketSend(reason) => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason,
                }
            }
            trajeto_api::Error::ConnectTimeout { timeout_secs } => {
                CoreError::Timeout { timeout_secs }
            }
            trajeto_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            trajeto_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            trajeto_api::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::History {
            message: err.to_string(),
        }
    }
}
