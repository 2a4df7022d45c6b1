// trajeto-api: wire protocol and transports for Trajeto real-time notifications

pub mod error;
pub mod polling;
pub mod transport;
pub mod websocket;
pub mod wire;

pub use error::Error;
pub use polling::{HttpNotificationSource, NotificationSource, derive_poll_url};
pub use transport::{DEFAULT_USER_AGENT, TransportConfig};
pub use websocket::{
    ABNORMAL_CLOSURE, Connection, Connector, Frame, HANDSHAKE_TIMEOUT, NORMAL_CLOSURE,
    WebSocketConnector, connection_url,
};
pub use wire::{Capabilities, InboundMessage, Notification, OutboundMessage, Priority, SystemAction};
