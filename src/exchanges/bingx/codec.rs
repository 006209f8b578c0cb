use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::json_frame;
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::{retain_open_positions, CandleCloser};
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::types::{Balance, Candle, KlineInterval, StreamUpdate};
use crate::exchanges::bingx::conversions::{
    convert_ws_candle, convert_ws_order, convert_ws_position, SYMBOLS,
};
use crate::exchanges::bingx::types::{BingxWsAccountUpdate, BingxWsCandle, BingxWsOrderUpdate};
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Server-side keep-alive ping, answered with `Pong`.
const SERVER_PING: &str = "Ping";

/// Largest inflated frame accepted; real pushes are a few KiB.
const MAX_FRAME_BYTES: usize = 1 << 20;

/// Frames arrive gzip-compressed as binary; text frames are taken as is.
pub fn inflate(message: &Message) -> Result<Option<String>, ExchangeError> {
    match message {
        Message::Text(text) => Ok(Some(text.clone())),
        Message::Binary(bytes) => {
            let mut text = String::new();
            GzDecoder::new(bytes.as_slice())
                .take(MAX_FRAME_BYTES as u64 + 1)
                .read_to_string(&mut text)
                .map_err(|e| {
                    ExchangeError::DeserializationError(format!("Bad BingX gzip frame: {}", e))
                })?;
            if text.len() > MAX_FRAME_BYTES {
                return Err(ExchangeError::DeserializationError(format!(
                    "BingX gzip frame exceeds {} bytes",
                    MAX_FRAME_BYTES
                )));
            }
            Ok(Some(text))
        }
        _ => Ok(None),
    }
}

enum Frame {
    Ping,
    Json(Value),
}

fn classify(message: &Message) -> Result<Option<Frame>, ExchangeError> {
    let Some(text) = inflate(message)? else {
        return Ok(None);
    };
    if text == SERVER_PING {
        return Ok(Some(Frame::Ping));
    }
    serde_json::from_str(&text)
        .map(|value| Some(Frame::Json(value)))
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad BingX frame: {}", e)))
}

fn parse_event<T: DeserializeOwned>(value: Value, event: &str) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse BingX {}: {}", event, e))
    })
}

fn pong() -> Decoded<StreamUpdate> {
    Decoded::Reply(Message::Text("Pong".to_string()))
}

/// `sub` request; the data type doubles as the request id.
pub fn subscribe_frame(data_type: &str) -> Message {
    json_frame(&json!({ "id": data_type, "reqType": "sub", "dataType": data_type }))
}

/// Account stream bound to a listen key: order and account updates.
pub struct BingxOrderCodec {
    instrument: Arc<Instrument>,
}

impl BingxOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    fn account_updates(&self, update: &BingxWsAccountUpdate) -> Vec<StreamUpdate> {
        let mut updates: Vec<StreamUpdate> = update
            .data
            .balances
            .iter()
            .map(|b| {
                StreamUpdate::Balance(Balance {
                    asset: b.asset.to_ascii_uppercase(),
                    total: b.wallet_balance,
                    available: b.cross_wallet_balance,
                })
            })
            .collect();

        let touched = update
            .data
            .positions
            .iter()
            .any(|p| self.instrument.is_native(&p.symbol));
        if touched {
            let ours = update
                .data
                .positions
                .iter()
                .filter(|p| self.instrument.is_native(&p.symbol))
                .map(|p| convert_ws_position(p, &self.instrument))
                .collect();
            updates.push(StreamUpdate::Positions(retain_open_positions(ours)));
        }
        updates
    }
}

impl WsCodec for BingxOrderCodec {
    type Event = StreamUpdate;

    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        let data_type = streams.first().ok_or_else(|| {
            ExchangeError::InvalidParameters("missing BingX data type".to_string())
        })?;
        Ok(subscribe_frame(data_type))
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        let value = match classify(&message)? {
            None => return Ok(Decoded::Ignore),
            Some(Frame::Ping) => return Ok(pong()),
            Some(Frame::Json(value)) => value,
        };

        match value.get("e").and_then(Value::as_str) {
            Some("ORDER_TRADE_UPDATE") => {
                let update: BingxWsOrderUpdate = parse_event(value, "order update")?;
                if !self.instrument.is_native(&update.order.symbol) {
                    return Ok(Decoded::Ignore);
                }
                let order = convert_ws_order(&update.order, &self.instrument, update.event_time);
                Ok(Decoded::Events(vec![StreamUpdate::Order(order)]))
            }
            Some("ACCOUNT_UPDATE") => {
                let update: BingxWsAccountUpdate = parse_event(value, "account update")?;
                Ok(Decoded::Events(self.account_updates(&update)))
            }
            Some("listenKeyExpired") => Ok(Decoded::Reconnect("listen key expired".to_string())),
            _ => Ok(Decoded::Ignore),
        }
    }
}

/// Public `<symbol>@kline_<interval>`; bars are never flagged final.
pub struct BingxKlineCodec {
    interval: KlineInterval,
    closer: CandleCloser,
}

impl BingxKlineCodec {
    pub fn new(interval: KlineInterval) -> Self {
        Self {
            interval,
            closer: CandleCloser::new(),
        }
    }

    pub fn data_type(native: &str, code: &str) -> String {
        format!("{}@kline_{}", native, code)
    }
}

impl WsCodec for BingxKlineCodec {
    type Event = Candle;

    /// One frame per data type: `streams` is `[data_type]`.
    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        let data_type = streams.first().ok_or_else(|| {
            ExchangeError::InvalidParameters("missing BingX data type".to_string())
        })?;
        Ok(subscribe_frame(data_type))
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        let value = match classify(&message)? {
            None => return Ok(Decoded::Ignore),
            Some(Frame::Ping) => return Ok(Decoded::Reply(Message::Text("Pong".to_string()))),
            Some(Frame::Json(value)) => value,
        };

        let code = value.get("code").and_then(Value::as_i64).unwrap_or_default();
        if code != 0 {
            warn!(exchange = "bingx", code, msg = %value["msg"], "Candle stream error");
            return Ok(Decoded::Ignore);
        }
        let data_type = value.get("dataType").and_then(Value::as_str).unwrap_or_default();
        let Some((native, _)) = data_type.split_once("@kline_") else {
            // Subscription acks echo the id and carry no data
            return Ok(if value.get("id").is_some() {
                Decoded::Subscribed
            } else {
                Decoded::Ignore
            });
        };
        let Some(data) = value.get("data").filter(|d| !d.is_null()) else {
            return Ok(Decoded::Subscribed);
        };

        let symbol = SYMBOLS.to_generic(native);
        let bars: Vec<BingxWsCandle> = parse_event(data.clone(), "candle")?;
        Ok(Decoded::Events(
            bars.iter()
                .map(|bar| convert_ws_candle(bar, &symbol, self.interval))
                .flat_map(|candle| self.closer.observe(candle))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderStatus;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Message {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        Message::Binary(encoder.finish().unwrap())
    }

    fn order_codec() -> BingxOrderCodec {
        BingxOrderCodec::new(Arc::new(Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()))
    }

    #[test]
    fn test_compressed_ping_is_answered() {
        let decoded = order_codec().decode_message(gzip("Ping")).unwrap();
        assert!(matches!(decoded, Decoded::Reply(Message::Text(ref t)) if t == "Pong"));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let huge = "a".repeat(MAX_FRAME_BYTES * 4);
        let err = inflate(&gzip(&huge)).unwrap_err();
        assert!(matches!(err, ExchangeError::DeserializationError(ref m) if m.contains("exceeds")));

        let fits = "a".repeat(MAX_FRAME_BYTES);
        assert_eq!(inflate(&gzip(&fits)).unwrap().unwrap().len(), MAX_FRAME_BYTES);
    }

    #[test]
    fn test_compressed_order_update() {
        let frame = json!({
            "e": "ORDER_TRADE_UPDATE", "E": 1702731661900_i64,
            "o": {"s": "BTC-USDT", "c": "cid", "i": 1735950529123455488_i64, "S": "BUY",
                  "o": "LIMIT", "q": "0.01", "p": "42000", "ap": "42000", "X": "FILLED",
                  "z": "0.01", "T": 1702731661854_i64}
        });
        let Decoded::Events(events) = order_codec().decode_message(gzip(&frame.to_string())).unwrap() else {
            panic!("expected events");
        };
        let StreamUpdate::Order(order) = &events[0] else {
            panic!("expected order");
        };
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.order_id, "1735950529123455488");
        assert_eq!(order.updated_at, 1_702_731_661_900);
    }

    #[test]
    fn test_listen_key_expiry_reconnects() {
        let decoded = order_codec()
            .decode_message(Message::Text(json!({"e": "listenKeyExpired"}).to_string()))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(_)));
    }

    #[test]
    fn test_kline_ack_and_rollover() {
        let codec = BingxKlineCodec::new(KlineInterval::Minutes1);
        let ack = json!({"id": "BTC-USDT@kline_1m", "code": 0, "msg": "", "dataType": "", "data": null});
        assert!(matches!(codec.decode_message(gzip(&ack.to_string())).unwrap(), Decoded::Subscribed));

        let push = |t: i64, c: &str| {
            gzip(&json!({
                "code": 0, "dataType": "BTC-USDT@kline_1m", "s": "BTC-USDT",
                "data": [{"o": "100", "h": "110", "l": "90", "c": c, "v": "5", "T": t}]
            })
            .to_string())
        };
        let Decoded::Events(first) = codec.decode_message(push(1_700_000_000_000, "101")).unwrap() else {
            panic!("expected candles");
        };
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].symbol, "BTCUSDT");

        let Decoded::Events(next) = codec.decode_message(push(1_700_000_060_000, "102")).unwrap() else {
            panic!("expected candles");
        };
        assert!(next[0].is_closed);
        assert_eq!(next[0].close, "101".parse().unwrap());
        assert!(!next[1].is_closed);
    }
}
