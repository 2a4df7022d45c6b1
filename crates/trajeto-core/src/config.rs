// ── Runtime client configuration ──
//
// These types describe *how* to reach the notification server.
// They carry connection tuning only, never credentials, and never touch disk.
// The host application (or trajeto-config) builds a `ClientConfig` and hands it in.

use std::time::Duration;

use url::Url;

use trajeto_api::{DEFAULT_USER_AGENT, TransportConfig, derive_poll_url};

use crate::error::CoreError;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_millis(10_000);

/// Configuration for one real-time client.
///
/// Immutable once handed to [`RealtimeClient`](crate::RealtimeClient);
/// per-session tweaks go through [`ConfigOverrides`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Channel address (e.g. `wss://app.example.com/ws`).
    pub server_url: Url,
    /// Explicit polling endpoint. Derived from `server_url` when `None`.
    pub poll_url: Option<Url>,
    /// Base delay of the exponential reconnect backoff.
    pub reconnect_interval: Duration,
    /// Reconnect attempts before degrading to polling.
    pub max_reconnect_attempts: u32,
    /// Period of the liveness probe.
    pub heartbeat_interval: Duration,
    /// Poll over HTTP once reconnection gives up.
    pub fallback_enabled: bool,
    /// Period of the fallback poll.
    pub fallback_interval: Duration,
    /// Log every inbound frame at `info`.
    pub debug: bool,
    /// Timeout applied to fallback HTTP requests.
    pub request_timeout: Duration,
    /// Announced in the `identify` handshake and the HTTP `User-Agent`.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            poll_url: None,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            fallback_enabled: true,
            fallback_interval: DEFAULT_FALLBACK_INTERVAL,
            debug: false,
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Copy of this config with every `Some` field of `overrides` applied.
    pub fn merged(&self, overrides: &ConfigOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(ref url) = overrides.server_url {
            merged.server_url = url.clone();
        }
        if let Some(ref url) = overrides.poll_url {
            merged.poll_url = Some(url.clone());
        }
        if let Some(v) = overrides.reconnect_interval {
            merged.reconnect_interval = v;
        }
        if let Some(v) = overrides.max_reconnect_attempts {
            merged.max_reconnect_attempts = v;
        }
        if let Some(v) = overrides.heartbeat_interval {
            merged.heartbeat_interval = v;
        }
        if let Some(v) = overrides.fallback_enabled {
            merged.fallback_enabled = v;
        }
        if let Some(v) = overrides.fallback_interval {
            merged.fallback_interval = v;
        }
        if let Some(v) = overrides.debug {
            merged.debug = v;
        }
        merged
    }

    /// Reject values the timers cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.heartbeat_interval.is_zero() {
            return Err(CoreError::Config {
                message: "heartbeat interval must be greater than zero".into(),
            });
        }
        if self.fallback_enabled && self.fallback_interval.is_zero() {
            return Err(CoreError::Config {
                message: "fallback poll interval must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// The endpoint the fallback poller hits.
    pub fn poll_endpoint(&self) -> Result<Url, CoreError> {
        match self.poll_url {
            Some(ref url) => Ok(url.clone()),
            None => Ok(derive_poll_url(&self.server_url)?),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
            ..TransportConfig::default()
        }
    }
}

/// Per-session overrides, merged over [`ClientConfig`] on read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub server_url: Option<Url>,
    pub poll_url: Option<Url>,
    pub reconnect_interval: Option<Duration>,
    pub max_reconnect_attempts: Option<u32>,
    pub heartbeat_interval: Option<Duration>,
    pub fallback_enabled: Option<bool>,
    pub fallback_interval: Option<Duration>,
    pub debug: Option<bool>,
}
