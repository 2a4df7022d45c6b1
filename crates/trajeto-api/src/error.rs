use thiserror::Error;

/// Top-level error type for the `trajeto-api` crate.
///
/// Covers every failure mode of the wire layer: the WebSocket channel,
/// the HTTP fallback endpoint, and message (de)serialization.
/// `trajeto-core` maps these into session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The runtime cannot open a channel for this URL scheme.
    #[error("Unsupported URL scheme '{scheme}' (expected ws or wss)")]
    UnsupportedScheme { scheme: String },

    /// Non-success HTTP status from the polling endpoint.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The opening handshake did not complete in time.
    #[error("WebSocket handshake timed out after {timeout_secs}s")]
    ConnectTimeout { timeout_secs: u64 },

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Writing a frame to the socket failed.
    #[error("WebSocket send failed: {0}")]
    WebSocketSend(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// JSON serialization of an outbound message failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::ConnectTimeout { .. } | Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => {
                true
            }
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::ConnectTimeout { timeout_secs: 10 }.is_transient());
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::HttpStatus {
                status: 503,
                url: "http://x".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Deserialization {
                message: "expected value".into(),
                body: "<html>".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn unauthorized_statuses() {
        let err = Error::HttpStatus {
            status: 401,
            url: "http://x".into(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_transient());

        let err = Error::HttpStatus {
            status: 503,
            url: "http://x".into(),
        };
        assert!(!err.is_unauthorized());
    }
}
