// ── Session handshake ──
//
// The token travels in the connection URL; once open, the client
// announces itself with `identify` and the server answers with
// `auth_success` or `auth_failed`.

use std::sync::Arc;

use serde_json::Value;

use trajeto_api::OutboundMessage;

use crate::config::ClientConfig;
use crate::event::ClientEvent;
use crate::notifier::Notifier;
use crate::shared::Shared;

pub(crate) fn identify_message(config: &ClientConfig, notifier: &dyn Notifier) -> OutboundMessage {
    OutboundMessage::identify(&config.user_agent, notifier.capabilities())
}

/// Store the session's user (`data.user`, else the whole payload).
pub(crate) fn accept(shared: &Shared, data: Value) {
    let user = data.get("user").cloned().unwrap_or_else(|| data.clone());
    shared.user.store(Some(Arc::new(user)));
    tracing::info!("Session authenticated");
    shared.emit(ClientEvent::AuthSuccess(Arc::new(data)));
}

pub(crate) fn reject(shared: &Shared, reason: String) {
    tracing::warn!(reason = %reason, "Server rejected the session");
    shared.user.store(None);
    shared.emit(ClientEvent::AuthFailed { reason });
}
