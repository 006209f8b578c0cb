use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// What the stream session should do with one decoded frame.
#[derive(Debug)]
pub enum Decoded<E> {
    /// Control or unrelated frame, consumed silently.
    Ignore,
    /// Login acknowledged; send these subscription frames next.
    LoggedIn(Vec<Message>),
    /// Subscription acknowledged.
    Subscribed,
    /// Frame that must be answered, e.g. an application-level ping.
    Reply(Message),
    /// Domain events, delivered to the callback in order.
    Events(Vec<E>),
    /// The server asked for (or forced) a fresh connection.
    Reconnect(String),
}

/// Codec trait for handling exchange-specific WebSocket message encoding/decoding
///
/// Each exchange implements this once per stream kind (order/account and
/// candle). Transport-level control frames (ping, pong, close) never reach
/// the codec.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed events from this exchange
    type Event: Send + 'static;

    /// Encode a subscription request for the given stream identifiers
    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError>;

    /// Heartbeat frame sent on the session's heartbeat interval.
    ///
    /// Defaults to a protocol-level ping; exchanges with an application ping
    /// (`"ping"`, `{"op":"ping"}`) override it.
    fn heartbeat(&self) -> Message {
        Message::Ping(Vec::new())
    }

    /// Decode a text or binary frame
    ///
    /// # Returns
    /// - `Ok(Decoded::Events(..))` - Successfully decoded events
    /// - `Ok(Decoded::Ignore)` - Message was filtered by the codec
    /// - `Err(error)` - Failed to decode; the session logs and drops it
    fn decode_message(&self, message: Message) -> Result<Decoded<Self::Event>, ExchangeError>;
}

/// Text payload of a frame, or `None` for non-text frames.
pub fn frame_text(message: &Message) -> Option<&str> {
    match message {
        Message::Text(text) => Some(text.as_str()),
        _ => None,
    }
}

/// Serialize a JSON value into a text frame.
pub fn json_frame(value: &serde_json::Value) -> Message {
    Message::Text(value.to_string())
}
