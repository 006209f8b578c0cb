use crate::core::errors::ExchangeError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWriter = SplitSink<WsStream, Message>;
pub type WsReader = SplitStream<WsStream>;

/// WebSocket session configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Dial + handshake timeout
    pub connect_timeout: Duration,
    /// Interval of the heartbeat frame
    pub heartbeat_interval: Duration,
    /// Reconnect when nothing (not even a pong) arrived for this long
    pub idle_timeout: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Consecutive failures between two `error!` reports; retrying never stops
    pub max_consecutive_failures: u32,
    /// Optional slower keep-alive (listen-key extension)
    pub keepalive_interval: Option<Duration>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(90),
            reconnect_delay: Duration::from_secs(5),
            max_consecutive_failures: 10,
            keepalive_interval: None,
        }
    }
}

impl WsConfig {
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }
}

/// Dial `url` and split the connection into its write and read halves.
#[instrument(skip(url), fields(url = %url))]
pub async fn connect(url: &str, connect_timeout: Duration) -> Result<(WsWriter, WsReader), ExchangeError> {
    let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| ExchangeError::ConnectionTimeout("WebSocket connection timeout".to_string()))?
        .map_err(|e| ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e)))?;

    debug!("WebSocket connected");
    Ok(ws_stream.split())
}
