use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::types::{Candle, KlineInterval, StreamUpdate};
use crate::exchanges::okx::conversions::{
    convert_balance, convert_candle_row, convert_order, convert_position, SYMBOLS,
};
use crate::exchanges::okx::types::{
    OkxCandleRow, OkxOrder, OkxPosition, OkxWsAccount, OkxWsEvent, OkxWsPush,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Private channels the order stream subscribes to after login.
pub const PRIVATE_CHANNELS: [&str; 3] = ["orders", "positions", "account"];

enum Frame {
    Pong,
    Event(OkxWsEvent),
    Push(OkxWsPush),
    Other,
}

fn classify(message: &Message) -> Result<Frame, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(Frame::Other);
    };
    if text == "pong" {
        return Ok(Frame::Pong);
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e)))?;
    if value.get("event").is_some() {
        return serde_json::from_value(value)
            .map(Frame::Event)
            .map_err(|e| ExchangeError::DeserializationError(format!("Bad OKX event: {}", e)));
    }
    if value.get("arg").is_some() && value.get("data").is_some() {
        return serde_json::from_value(value)
            .map(Frame::Push)
            .map_err(|e| ExchangeError::DeserializationError(format!("Bad OKX push: {}", e)));
    }
    Ok(Frame::Other)
}

fn parse_items<T: serde::de::DeserializeOwned>(data: Vec<Value>) -> Result<Vec<T>, ExchangeError> {
    data.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad OKX payload: {}", e)))
}

fn subscribe(args: Vec<Value>) -> Message {
    json_frame(&json!({ "op": "subscribe", "args": args }))
}

/// Private `orders`, `positions` and `account` channels of one instrument.
pub struct OkxOrderCodec {
    instrument: Arc<Instrument>,
}

impl OkxOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    fn updates(&self, push: OkxWsPush) -> Result<Vec<StreamUpdate>, ExchangeError> {
        match push.arg.channel.as_str() {
            "orders" => {
                let orders: Vec<OkxOrder> = parse_items(push.data)?;
                Ok(orders
                    .iter()
                    .filter(|o| self.instrument.is_native(&o.inst_id))
                    .map(|o| StreamUpdate::Order(convert_order(o, &self.instrument)))
                    .collect())
            }
            "positions" => {
                let positions: Vec<OkxPosition> = parse_items(push.data)?;
                let ours = positions
                    .iter()
                    .filter(|p| self.instrument.is_native(&p.inst_id))
                    .map(|p| convert_position(p, &self.instrument))
                    .collect();
                Ok(vec![StreamUpdate::Positions(retain_open_positions(ours))])
            }
            "account" => {
                let accounts: Vec<OkxWsAccount> = parse_items(push.data)?;
                Ok(accounts
                    .iter()
                    .flat_map(|a| a.details.iter())
                    .map(|d| StreamUpdate::Balance(convert_balance(d)))
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl WsCodec for OkxOrderCodec {
    type Event = StreamUpdate;

    fn encode_subscription(&self, channels: &[String]) -> Result<Message, ExchangeError> {
        let args = channels
            .iter()
            .map(|channel| match channel.as_str() {
                "account" => json!({ "channel": "account", "ccy": self.instrument.info.quote_asset }),
                _ => json!({
                    "channel": channel,
                    "instType": "SWAP",
                    "instId": self.instrument.native
                }),
            })
            .collect();
        Ok(subscribe(args))
    }

    /// OKX expects a literal `ping` text frame and answers `pong`.
    fn heartbeat(&self) -> Message {
        Message::Text("ping".to_string())
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        match classify(&message)? {
            Frame::Pong | Frame::Other => Ok(Decoded::Ignore),
            Frame::Event(event) => match event.event.as_str() {
                "login" if event.code == "0" || event.code.is_empty() => {
                    let channels: Vec<String> = PRIVATE_CHANNELS.iter().map(|c| c.to_string()).collect();
                    Ok(Decoded::LoggedIn(vec![self.encode_subscription(&channels)?]))
                }
                "subscribe" | "channel-conn-count" => Ok(Decoded::Subscribed),
                // Failed login or subscription; also service upgrade notices
                _ => Ok(Decoded::Reconnect(format!(
                    "{} {}: {}",
                    event.event, event.code, event.msg
                ))),
            },
            Frame::Push(push) => Ok(Decoded::Events(self.updates(push)?)),
        }
    }
}

/// Public `candle<bar>` channel for one interval.
pub struct OkxKlineCodec {
    interval: KlineInterval,
    channel: String,
}

impl OkxKlineCodec {
    pub fn new(interval: KlineInterval, bar: &str) -> Self {
        Self {
            interval,
            channel: format!("candle{}", bar),
        }
    }
}

impl WsCodec for OkxKlineCodec {
    type Event = Candle;

    fn encode_subscription(&self, inst_ids: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe(
            inst_ids
                .iter()
                .map(|id| json!({ "channel": self.channel, "instId": id }))
                .collect(),
        ))
    }

    fn heartbeat(&self) -> Message {
        Message::Text("ping".to_string())
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        match classify(&message)? {
            Frame::Pong | Frame::Other => Ok(Decoded::Ignore),
            Frame::Event(event) if event.event == "subscribe" => Ok(Decoded::Subscribed),
            Frame::Event(event) => {
                warn!(exchange = "okx", event = %event.event, code = %event.code, msg = %event.msg, "Candle stream event");
                Ok(Decoded::Ignore)
            }
            Frame::Push(push) => {
                if push.arg.channel != self.channel {
                    return Ok(Decoded::Ignore);
                }
                let symbol = SYMBOLS.to_generic(push.arg.inst_id.as_deref().unwrap_or_default());
                let rows: Vec<OkxCandleRow> = parse_items(push.data)?;
                Ok(Decoded::Events(
                    rows.iter()
                        .filter_map(|row| convert_candle_row(row, &symbol, self.interval))
                        .collect(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderStatus;

    fn order_codec() -> OkxOrderCodec {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.01".parse().unwrap());
        OkxOrderCodec::new(Arc::new(instrument))
    }

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    #[test]
    fn test_login_ack_carries_subscriptions() {
        let decoded = order_codec()
            .decode_message(text(json!({"event": "login", "code": "0", "msg": ""})))
            .unwrap();
        let Decoded::LoggedIn(frames) = decoded else {
            panic!("expected login ack");
        };
        let Message::Text(frame) = &frames[0] else {
            panic!("expected text frame");
        };
        let frame: Value = serde_json::from_str(frame).unwrap();
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["args"][0]["instId"], "BTC-USDT-SWAP");
        assert_eq!(frame["args"][2], json!({"channel": "account", "ccy": "USDT"}));
    }

    #[test]
    fn test_login_failure_reconnects() {
        let decoded = order_codec()
            .decode_message(text(json!({"event": "error", "code": "60009", "msg": "Login failed."})))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(ref r) if r.contains("60009")));
    }

    #[test]
    fn test_order_push_is_normalized() {
        let decoded = order_codec()
            .decode_message(text(json!({
                "arg": {"channel": "orders", "instType": "SWAP", "instId": "BTC-USDT-SWAP"},
                "data": [{
                    "instId": "BTC-USDT-SWAP", "ordId": "42", "clOrdId": "", "px": "60000",
                    "sz": "2", "ordType": "post_only", "side": "sell", "state": "partially_filled",
                    "accFillSz": "1", "avgPx": "60000", "cTime": "1", "uTime": "2"
                }]
            })))
            .unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        let StreamUpdate::Order(order) = &events[0] else {
            panic!("expected order");
        };
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.quantity, "0.02".parse().unwrap());
        assert_eq!(order.executed_quantity, "0.01".parse().unwrap());
    }

    #[test]
    fn test_pong_is_consumed() {
        let decoded = order_codec().decode_message(Message::Text("pong".to_string())).unwrap();
        assert!(matches!(decoded, Decoded::Ignore));
        assert_eq!(order_codec().heartbeat(), Message::Text("ping".to_string()));
    }

    #[test]
    fn test_candle_push() {
        let codec = OkxKlineCodec::new(KlineInterval::Minutes5, "5m");
        let decoded = codec
            .decode_message(text(json!({
                "arg": {"channel": "candle5m", "instId": "ETH-USDT-SWAP"},
                "data": [["1597026383085", "8533", "8553", "8527", "8548", "45247", "529.5", "4521", "1"]]
            })))
            .unwrap();
        let Decoded::Events(candles) = decoded else {
            panic!("expected candles");
        };
        assert_eq!(candles[0].symbol, "ETHUSDT");
        assert_eq!(candles[0].interval, KlineInterval::Minutes5);
        assert!(candles[0].is_closed);
    }
}
