use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::types::{Candle, KlineInterval, StreamUpdate};
use crate::exchanges::bybit::conversions::{
    convert_balance, convert_order, convert_position, convert_ws_kline, SYMBOLS,
};
use crate::exchanges::bybit::types::{
    BybitOrder, BybitPosition, BybitWsKline, BybitWsPush, BybitWsReply, BybitWsWallet,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Private topics subscribed once `auth` is acknowledged.
pub const PRIVATE_TOPICS: [&str; 3] = ["order", "position", "wallet"];

enum Frame {
    Reply(BybitWsReply),
    Push(BybitWsPush),
    Other,
}

fn classify(message: &Message) -> Result<Frame, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(Frame::Other);
    };
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e)))?;
    if value.get("topic").is_some() {
        return parse(value).map(Frame::Push);
    }
    if value.get("op").is_some() {
        return parse(value).map(Frame::Reply);
    }
    Ok(Frame::Other)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad Bybit payload: {}", e)))
}

fn subscribe(topics: &[String]) -> Message {
    json_frame(&json!({ "op": "subscribe", "args": topics }))
}

fn ping() -> Message {
    json_frame(&json!({ "op": "ping" }))
}

/// `order`, `position` and `wallet` topics, narrowed to one symbol.
pub struct BybitOrderCodec {
    instrument: Arc<Instrument>,
}

impl BybitOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    fn updates(&self, push: BybitWsPush) -> Result<Vec<StreamUpdate>, ExchangeError> {
        let topic = push.topic.split('.').next().unwrap_or_default();
        match topic {
            "order" => {
                let orders: Vec<BybitOrder> = parse(push.data)?;
                Ok(orders
                    .iter()
                    .filter(|o| self.instrument.is_native(&o.symbol))
                    .map(|o| StreamUpdate::Order(convert_order(o, &self.instrument)))
                    .collect())
            }
            "position" => {
                let positions: Vec<BybitPosition> = parse(push.data)?;
                let ours: Vec<_> = positions
                    .iter()
                    .filter(|p| self.instrument.is_native(&p.symbol))
                    .map(|p| convert_position(p, &self.instrument))
                    .collect();
                if ours.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![StreamUpdate::Positions(retain_open_positions(ours))])
            }
            "wallet" => {
                let wallets: Vec<BybitWsWallet> = parse(push.data)?;
                Ok(wallets
                    .iter()
                    .flat_map(|w| w.coin.iter())
                    .map(|c| StreamUpdate::Balance(convert_balance(c)))
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl WsCodec for BybitOrderCodec {
    type Event = StreamUpdate;

    fn encode_subscription(&self, topics: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe(topics))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        match classify(&message)? {
            Frame::Other => Ok(Decoded::Ignore),
            Frame::Reply(reply) => match (reply.op.as_str(), reply.success) {
                ("auth", Some(true)) => {
                    let topics: Vec<String> = PRIVATE_TOPICS.iter().map(|t| t.to_string()).collect();
                    Ok(Decoded::LoggedIn(vec![self.encode_subscription(&topics)?]))
                }
                ("auth" | "subscribe", Some(false)) => Ok(Decoded::Reconnect(format!(
                    "{} rejected: {}",
                    reply.op, reply.ret_msg
                ))),
                ("subscribe", _) => Ok(Decoded::Subscribed),
                _ => Ok(Decoded::Ignore),
            },
            Frame::Push(push) => Ok(Decoded::Events(self.updates(push)?)),
        }
    }
}

/// Public `kline.<interval>.<symbol>` topics.
pub struct BybitKlineCodec {
    interval: KlineInterval,
    code: &'static str,
}

impl BybitKlineCodec {
    pub fn new(interval: KlineInterval, code: &'static str) -> Self {
        Self { interval, code }
    }

    pub fn topic(&self, native: &str) -> String {
        format!("kline.{}.{}", self.code, native)
    }
}

impl WsCodec for BybitKlineCodec {
    type Event = Candle;

    fn encode_subscription(&self, topics: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe(topics))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        match classify(&message)? {
            Frame::Other => Ok(Decoded::Ignore),
            Frame::Reply(reply) if reply.op == "subscribe" => {
                if reply.success == Some(false) {
                    warn!(exchange = "bybit", msg = %reply.ret_msg, "Kline subscription rejected");
                    return Ok(Decoded::Ignore);
                }
                Ok(Decoded::Subscribed)
            }
            Frame::Reply(_) => Ok(Decoded::Ignore),
            Frame::Push(push) => {
                let mut parts = push.topic.splitn(3, '.');
                let (Some("kline"), Some(code), Some(symbol)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Ok(Decoded::Ignore);
                };
                if code != self.code {
                    return Ok(Decoded::Ignore);
                }
                let symbol = SYMBOLS.to_generic(symbol);
                let klines: Vec<BybitWsKline> = parse(push.data)?;
                Ok(Decoded::Events(
                    klines
                        .iter()
                        .map(|k| convert_ws_kline(k, &symbol, self.interval))
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

    fn codec() -> BybitOrderCodec {
        BybitOrderCodec::new(Arc::new(Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()))
    }

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    #[test]
    fn test_auth_ack_subscribes() {
        let decoded = codec()
            .decode_message(text(json!({"success": true, "ret_msg": "", "op": "auth", "conn_id": "c1"})))
            .unwrap();
        let Decoded::LoggedIn(frames) = decoded else {
            panic!("expected login ack");
        };
        assert_eq!(
            frames[0],
            text(json!({"op": "subscribe", "args": ["order", "position", "wallet"]}))
        );
    }

    #[test]
    fn test_auth_failure_reconnects() {
        let decoded = codec()
            .decode_message(text(json!({"success": false, "ret_msg": "Params Error", "op": "auth"})))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(_)));
    }

    #[test]
    fn test_foreign_symbol_orders_are_dropped() {
        let order = |symbol: &str| {
            json!({
                "symbol": symbol, "orderId": "1", "orderLinkId": "", "side": "Buy",
                "orderType": "Limit", "price": "100", "qty": "1", "cumExecQty": "0",
                "avgPrice": "", "orderStatus": "New", "createdTime": "1", "updatedTime": "1"
            })
        };
        let decoded = codec()
            .decode_message(text(json!({
                "topic": "order", "creationTime": 1,
                "data": [order("ETHUSDT"), order("BTCUSDT")]
            })))
            .unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamUpdate::Order(o) if o.status == OrderStatus::New));
    }

    #[test]
    fn test_closed_position_reports_empty_list() {
        let decoded = codec()
            .decode_message(text(json!({
                "topic": "position",
                "data": [{"symbol": "BTCUSDT", "side": "", "size": "0", "entryPrice": "0",
                          "markPrice": "60000", "unrealisedPnl": "0", "leverage": "10", "tradeMode": 0}]
            })))
            .unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        assert_eq!(events, vec![StreamUpdate::Positions(Vec::new())]);
    }

    #[test]
    fn test_kline_confirm_flag() {
        let codec = BybitKlineCodec::new(KlineInterval::Minutes5, "5");
        assert_eq!(codec.topic(&SYMBOLS.to_native("ETHUSDT").unwrap()), "kline.5.ETHUSDT");
        let decoded = codec
            .decode_message(text(json!({
                "topic": "kline.5.ETHUSDT", "type": "snapshot", "ts": 1672324988882_i64,
                "data": [{"start": 1672324800000_i64, "end": 1672325099999_i64, "interval": "5",
                          "open": "16649.5", "close": "16677", "high": "16677", "low": "16608",
                          "volume": "2.081", "turnover": "34666.4005", "confirm": false,
                          "timestamp": 1672324988882_i64}]
            })))
            .unwrap();
        let Decoded::Events(candles) = decoded else {
            panic!("expected candles");
        };
        assert_eq!(candles[0].symbol, "ETHUSDT");
        assert!(!candles[0].is_closed);
        assert_eq!(candles[0].timestamp, 1_672_324_800_000);
    }
}
