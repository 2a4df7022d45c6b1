// ── Platform side effects ──
//
// Toasts, OS notifications, sound and vibration are delegated to a
// `Notifier` so the core runs headless. Every method has a no-op
// default; hosts override what their platform supports.

use thiserror::Error;

use trajeto_api::{Capabilities, Notification, Priority};

/// Vibration pattern used for critical notifications, in milliseconds.
pub const VIBRATION_PATTERN: [u64; 3] = [200, 100, 200];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Default,
}

/// Identifies one on-screen toast so it can be dismissed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastId(pub u64);

#[derive(Debug, Error)]
#[error("notifier failed: {0}")]
pub struct NotifierError(pub String);

pub trait Notifier: Send + Sync {
    /// Announced to the server in the `identify` handshake.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn permission(&self) -> Permission {
        Permission::Default
    }

    /// Ask the platform for notification permission.
    fn request_permission(&self) -> Permission {
        self.permission()
    }

    fn show_toast(&self, _id: ToastId, _notification: &Notification) {}

    fn dismiss_toast(&self, _id: ToastId) {}

    fn show_platform_notification(
        &self,
        _notification: &Notification,
        _require_interaction: bool,
    ) -> Result<(), NotifierError> {
        Ok(())
    }

    fn play_sound(&self, _priority: Priority) -> Result<(), NotifierError> {
        Ok(())
    }

    fn vibrate(&self, _pattern: &[u64]) -> Result<(), NotifierError> {
        Ok(())
    }
}

/// Does nothing. Used when the host supplies no notifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}
