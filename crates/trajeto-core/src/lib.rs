// trajeto-core: real-time notification client for Trajeto
//
// Keeps one authenticated channel to the notification server alive,
// falls back to HTTP polling when it cannot, and turns every inbound
// message into typed events for UI code.

pub mod client;
pub mod config;
mod dispatch;
pub mod error;
pub mod event;
pub mod history;
pub mod notifier;
pub mod registry;
mod session;
mod shared;
pub mod state;
pub mod stats;

pub use client::{RealtimeClient, RealtimeClientBuilder};
pub use config::{ClientConfig, ConfigOverrides};
pub use dispatch::TOAST_TTL;
pub use error::CoreError;
pub use event::{ClientEvent, EventKind, UnknownEvent};
pub use history::{
    HISTORY_CAPACITY, HistoryEntry, HistoryStore, JsonFileHistoryStore, MemoryHistoryStore,
    NotificationHistory,
};
pub use notifier::{NoopNotifier, Notifier, NotifierError, Permission, ToastId, VIBRATION_PATTERN};
pub use registry::{EventRegistry, Handler, SubscriptionId};
pub use session::heartbeat::HEARTBEAT_TIMEOUT_CODE;
pub use session::reconnect::MAX_BACKOFF;
pub use state::ConnectionState;
pub use stats::StatsSnapshot;

// Wire types consumers need to handle events without depending on trajeto-api.
pub use trajeto_api::{Capabilities, Notification, Priority};
