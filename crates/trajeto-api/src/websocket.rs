//! Bidirectional real-time channel.
//!
//! [`Connector`] is the seam between the session state machine and the
//! network: it opens one connection and hands back a frame sink and a
//! frame stream. [`WebSocketConnector`] is the production implementation
//! on top of `tokio-tungstenite`; tests plug in scripted connectors.
//!
//! # Example
//!
//! ```rust,ignore
//! use trajeto_api::websocket::{WebSocketConnector, connection_url, open};
//! use url::Url;
//!
//! let base = Url::parse("wss://app.example.com/ws")?;
//! let url = connection_url(&base, "session-token");
//! let mut conn = open(&WebSocketConnector::default(), &url).await?;
//!
//! while let Some(frame) = conn.stream.next().await {
//!     println!("{frame:?}");
//! }
//! ```

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use url::Url;

use crate::error::Error;
use crate::transport::DEFAULT_USER_AGENT;

/// Fixed upper bound on the opening handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code for an intentional, client-requested shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection drops without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ── Frames ───────────────────────────────────────────────────────────

/// The two frame kinds the notification protocol cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: u16, reason: String },
}

impl Frame {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close {
            code,
            reason: reason.into(),
        }
    }

    fn into_message(self) -> tungstenite::Message {
        match self {
            Self::Text(text) => tungstenite::Message::text(text),
            Self::Close { code, reason } => tungstenite::Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })),
        }
    }

    fn from_message(message: tungstenite::Message) -> Option<Self> {
        match message {
            tungstenite::Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            tungstenite::Message::Close(Some(cf)) => Some(Self::Close {
                code: u16::from(cf.code),
                reason: cf.reason.as_str().to_owned(),
            }),
            tungstenite::Message::Close(None) => Some(Self::close(ABNORMAL_CLOSURE, "")),
            // Binary, Ping, Pong, Frame -- tungstenite answers pings itself
            _ => None,
        }
    }
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = Error> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, Error>> + Send>>;

/// One open channel, split into its write and read halves.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens a single bidirectional connection to `url`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Connection, Error>;
}

/// `tokio-tungstenite` backed connector.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    user_agent: String,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl WebSocketConnector {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<Connection, Error> {
        ensure_ws_scheme(url)?;
        tracing::info!(url = %redacted(url), "Connecting to WebSocket");

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;
        let request =
            ClientRequestBuilder::new(uri).with_header("User-Agent", self.user_agent.clone());

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("WebSocket connected");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| Error::WebSocketSend(e.to_string()))
            .with(|frame: Frame| future::ready(Ok::<_, Error>(frame.into_message())));

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(message) => Frame::from_message(message).map(Ok),
                Err(e) => Some(Err(Error::WebSocketConnect(e.to_string()))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Open a connection, failing if the handshake exceeds [`HANDSHAKE_TIMEOUT`].
pub async fn open(connector: &dyn Connector, url: &Url) -> Result<Connection, Error> {
    tokio::time::timeout(HANDSHAKE_TIMEOUT, connector.connect(url))
        .await
        .map_err(|_| Error::ConnectTimeout {
            timeout_secs: HANDSHAKE_TIMEOUT.as_secs(),
        })?
}

/// Append the session token to `base` as the URL-encoded `token` query credential.
pub fn connection_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

/// Reject schemes a WebSocket cannot be opened on.
pub fn ensure_ws_scheme(url: &Url) -> Result<(), Error> {
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(Error::UnsupportedScheme {
            scheme: other.to_owned(),
        }),
    }
}

/// The URL without its query string, safe to log.
fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

// ── Tests ────────────────────────────────────────────────────────────
