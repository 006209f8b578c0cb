use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::{retain_open_positions, CandleCloser};
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::types::{Candle, KlineInterval, StreamUpdate};
use crate::exchanges::bitget::conversions::{
    convert_balance, convert_candle_row, convert_order, convert_position, PRODUCT_TYPE, SYMBOLS,
};
use crate::exchanges::bitget::types::{
    BitgetAccount, BitgetCandleRow, BitgetOrder, BitgetPosition, BitgetWsEvent, BitgetWsPush,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

pub const PRIVATE_CHANNELS: [&str; 3] = ["orders", "positions", "account"];

enum Frame {
    Event(BitgetWsEvent),
    Push(BitgetWsPush),
    Other,
}

fn classify(message: &Message) -> Result<Frame, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(Frame::Other);
    };
    if text == "pong" {
        return Ok(Frame::Other);
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e)))?;
    if value.get("event").is_some() {
        return parse_one(value).map(Frame::Event);
    }
    if value.get("arg").is_some() && value.get("data").is_some() {
        return parse_one(value).map(Frame::Push);
    }
    Ok(Frame::Other)
}

fn parse_one<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad Bitget payload: {}", e)))
}

/// Parse each item on its own; a malformed one is logged and skipped.
fn parse_items<T: DeserializeOwned>(channel: &str, data: Vec<Value>) -> Vec<T> {
    data.into_iter()
        .filter_map(|item| match parse_one(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(exchange = "bitget", channel = %channel, error = %e, "Skipping malformed push item");
                None
            }
        })
        .collect()
}

/// Snapshots are all-or-nothing: a skipped row would read as a closed position.
fn parse_snapshot<T: DeserializeOwned>(data: Vec<Value>) -> Result<Vec<T>, ExchangeError> {
    data.into_iter().map(parse_one).collect()
}

fn subscribe(args: Vec<Value>) -> Message {
    json_frame(&json!({ "op": "subscribe", "args": args }))
}

fn ping() -> Message {
    Message::Text("ping".to_string())
}

/// Private `orders`, `positions` and `account` channels, narrowed to one symbol.
pub struct BitgetOrderCodec {
    instrument: Arc<Instrument>,
}

impl BitgetOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    fn updates(&self, push: BitgetWsPush) -> Result<Vec<StreamUpdate>, ExchangeError> {
        match push.arg.channel.as_str() {
            "orders" => {
                let orders: Vec<BitgetOrder> = parse_items(&push.arg.channel, push.data);
                Ok(orders
                    .iter()
                    .filter(|o| self.instrument.is_native(&o.symbol))
                    .map(|o| StreamUpdate::Order(convert_order(o, &self.instrument)))
                    .collect())
            }
            // Every push is a full snapshot, so an absent symbol means flat
            "positions" => {
                let positions: Vec<BitgetPosition> = parse_snapshot(push.data)?;
                let ours = positions
                    .iter()
                    .filter(|p| self.instrument.is_native(&p.symbol))
                    .map(|p| convert_position(p, &self.instrument))
                    .collect();
                Ok(vec![StreamUpdate::Positions(retain_open_positions(ours))])
            }
            "account" => {
                let accounts: Vec<BitgetAccount> = parse_items(&push.arg.channel, push.data);
                Ok(accounts
                    .iter()
                    .map(|a| StreamUpdate::Balance(convert_balance(a)))
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl WsCodec for BitgetOrderCodec {
    type Event = StreamUpdate;

    fn encode_subscription(&self, channels: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe(
            channels
                .iter()
                .map(|channel| match channel.as_str() {
                    "account" => json!({ "instType": PRODUCT_TYPE, "channel": "account", "coin": "default" }),
                    _ => json!({ "instType": PRODUCT_TYPE, "channel": channel, "instId": "default" }),
                })
                .collect(),
        ))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        match classify(&message)? {
            Frame::Other => Ok(Decoded::Ignore),
            Frame::Event(event) => match event.event.as_str() {
                "login" if event.code.is_empty() || event.code == "0" => {
                    let channels: Vec<String> = PRIVATE_CHANNELS.iter().map(|c| c.to_string()).collect();
                    Ok(Decoded::LoggedIn(vec![self.encode_subscription(&channels)?]))
                }
                "subscribe" => Ok(Decoded::Subscribed),
                _ => Ok(Decoded::Reconnect(format!(
                    "{} {}: {}",
                    event.event, event.code, event.msg
                ))),
            },
            Frame::Push(push) => Ok(Decoded::Events(self.updates(push)?)),
        }
    }
}

/// Public `candle<granularity>` channel; closes buckets when the next one starts.
pub struct BitgetKlineCodec {
    interval: KlineInterval,
    channel: String,
    closer: CandleCloser,
}

impl BitgetKlineCodec {
    pub fn new(interval: KlineInterval, granularity: &str) -> Self {
        Self {
            interval,
            channel: format!("candle{}", granularity),
            closer: CandleCloser::new(),
        }
    }
}

impl WsCodec for BitgetKlineCodec {
    type Event = Candle;

    fn encode_subscription(&self, symbols: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe(
            symbols
                .iter()
                .map(|s| json!({ "instType": PRODUCT_TYPE, "channel": self.channel, "instId": s }))
                .collect(),
        ))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        match classify(&message)? {
            Frame::Other => Ok(Decoded::Ignore),
            Frame::Event(event) if event.event == "subscribe" => Ok(Decoded::Subscribed),
            Frame::Event(event) => {
                warn!(exchange = "bitget", event = %event.event, code = %event.code, msg = %event.msg, "Candle stream event");
                Ok(Decoded::Ignore)
            }
            Frame::Push(push) => {
                if push.arg.channel != self.channel {
                    return Ok(Decoded::Ignore);
                }
                let symbol = SYMBOLS.to_generic(&push.arg.inst_id);
                let rows: Vec<BitgetCandleRow> = parse_items(&push.arg.channel, push.data);
                Ok(Decoded::Events(
                    rows.iter()
                        .filter_map(|row| convert_candle_row(row, &symbol, self.interval))
                        .flat_map(|candle| self.closer.observe(candle))
                        .collect(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    fn candle_push(ts: &str, close: &str) -> Message {
        text(json!({
            "action": "update",
            "arg": {"instType": "USDT-FUTURES", "channel": "candle1m", "instId": "BTCUSDT"},
            "data": [[ts, "100", "110", "90", close, "12.5", "1250", "1250"]],
            "ts": 1
        }))
    }

    fn candles(decoded: Decoded<Candle>) -> Vec<Candle> {
        match decoded {
            Decoded::Events(candles) => candles,
            other => panic!("expected candles, got {:?}", other),
        }
    }

    #[test]
    fn test_login_ack_subscribes_private_channels() {
        let codec = BitgetOrderCodec::new(Arc::new(Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()));
        let decoded = codec.decode_message(text(json!({"event": "login", "code": 0, "msg": ""}))).unwrap();
        let Decoded::LoggedIn(frames) = decoded else {
            panic!("expected login ack");
        };
        let Message::Text(frame) = &frames[0] else {
            panic!("expected text frame");
        };
        let frame: Value = serde_json::from_str(frame).unwrap();
        assert_eq!(frame["args"][0]["channel"], "orders");
        assert_eq!(frame["args"][2]["coin"], "default");
    }

    #[test]
    fn test_login_error_reconnects() {
        let codec = BitgetOrderCodec::new(Arc::new(Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()));
        let decoded = codec
            .decode_message(text(json!({"event": "error", "code": 30005, "msg": "Invalid sign"})))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(ref r) if r.contains("30005")));
    }

    fn order_item(order_id: &str) -> Value {
        json!({
            "instId": "BTCUSDT", "orderId": order_id, "clientOid": format!("c{}", order_id),
            "price": "27000", "size": "0.01", "accBaseVolume": "0", "priceAvg": "0",
            "side": "buy", "orderType": "limit", "status": "live",
            "cTime": "1695718781129", "uTime": "1695718781129"
        })
    }

    #[test]
    fn test_malformed_order_item_keeps_the_rest() {
        let codec = BitgetOrderCodec::new(Arc::new(Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()));
        let push = text(json!({
            "action": "snapshot",
            "arg": {"instType": "USDT-FUTURES", "channel": "orders", "instId": "default"},
            "data": [order_item("1"), {"instId": "BTCUSDT", "size": "oops"}, order_item("3")],
            "ts": 1
        }));
        let Decoded::Events(events) = codec.decode_message(push).unwrap() else {
            panic!("expected events");
        };
        let ids: Vec<&str> = events
            .iter()
            .map(|event| match event {
                StreamUpdate::Order(order) => order.order_id.as_str(),
                other => panic!("expected order, got {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_provisional_updates_are_forwarded_then_closed() {
        let codec = BitgetKlineCodec::new(KlineInterval::Minutes1, "1m");
        let first = candles(codec.decode_message(candle_push("1695685500000", "101")).unwrap());
        let second = candles(codec.decode_message(candle_push("1695685500000", "102")).unwrap());
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(!second[0].is_closed);

        let rolled = candles(codec.decode_message(candle_push("1695685560000", "103")).unwrap());
        assert_eq!(rolled.len(), 2);
        assert!(rolled[0].is_closed);
        assert_eq!(rolled[0].close, "102".parse().unwrap());
        assert!(!rolled[1].is_closed);
    }
}
