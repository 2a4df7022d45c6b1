//! HTTP pull of queued notifications, used while the channel is down.
//!
//! The endpoint answers an authenticated `GET` with
//! `{ "notifications": [ ... ] }`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::wire::Notification;

/// Path the backend serves pending notifications on.
pub const DEFAULT_POLL_PATH: &str = "/api/notifications/pending";

/// Anything that can hand back the notifications queued for a session.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn fetch(&self, token: &SecretString) -> Result<Vec<Notification>, Error>;
}

/// Elements stay raw so one malformed entry cannot sink the batch.
#[derive(Debug, Deserialize)]
struct PendingNotifications {
    #[serde(default)]
    notifications: Vec<Value>,
}

impl PendingNotifications {
    /// Decode each element on its own, in order, skipping the bad ones.
    fn into_notifications(self) -> Vec<Notification> {
        let total = self.notifications.len();
        let notifications: Vec<Notification> = self
            .notifications
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value(raw) {
                Ok(notification) => Some(notification),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed pending notification");
                    None
                }
            })
            .collect();

        let rejected = total - notifications.len();
        if rejected > 0 {
            tracing::warn!(rejected, total, "Pending batch had malformed notifications");
        }
        notifications
    }
}

/// `reqwest` backed [`NotificationSource`].
#[derive(Debug, Clone)]
pub struct HttpNotificationSource {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpNotificationSource {
    pub fn new(endpoint: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, endpoint))
    }

    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationSource for HttpNotificationSource {
    async fn fetch(&self, token: &SecretString) -> Result<Vec<Notification>, Error> {
        tracing::debug!(url = %self.endpoint, "Polling pending notifications");

        let response = self
            .http
            .get(self.endpoint.clone())
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: self.endpoint.to_string(),
            });
        }

        let body = response.text().await?;
        let pending: PendingNotifications =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;

        Ok(pending.into_notifications())
    }
}

/// Derive the polling endpoint from the channel address:
/// `ws` becomes `http`, `wss` becomes `https`, and the path is replaced.
pub fn derive_poll_url(server: &Url) -> Result<Url, Error> {
    let scheme = match server.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = server.clone();
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: server.scheme().to_owned(),
    })?;
    url.set_path(DEFAULT_POLL_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
