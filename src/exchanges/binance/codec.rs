use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::types::{Balance, Candle, KlineInterval, StreamUpdate};
use crate::exchanges::binance::conversions::{self, SYMBOLS};
use crate::exchanges::binance::types::{
    BinanceWsAccountUpdate, BinanceWsKlineEvent, BinanceWsOrderUpdate,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;

fn parse_frame(message: &Message) -> Result<Option<Value>, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e)))
}

fn parse_event<T: DeserializeOwned>(value: Value, event: &str) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse {}: {}", event, e))
    })
}

fn subscribe_frame(streams: &[String]) -> Message {
    json_frame(&json!({
        "method": "SUBSCRIBE",
        "params": streams,
        "id": 1
    }))
}

/// User data stream: order, position and balance updates.
pub struct BinanceOrderCodec {
    instrument: Arc<Instrument>,
}

impl BinanceOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    fn account_updates(&self, update: &BinanceWsAccountUpdate) -> Vec<StreamUpdate> {
        let mut updates: Vec<StreamUpdate> = update
            .data
            .balances
            .iter()
            .map(|b| {
                StreamUpdate::Balance(Balance {
                    asset: b.asset.clone(),
                    total: b.wallet_balance,
                    available: b.cross_wallet_balance,
                })
            })
            .collect();

        let ours: Vec<_> = update
            .data
            .positions
            .iter()
            .filter(|p| self.instrument.is_native(&p.symbol))
            .map(|p| conversions::convert_ws_position(p, &self.instrument))
            .collect();
        // An empty list after filtering means the position was closed
        if update.data.positions.iter().any(|p| self.instrument.is_native(&p.symbol)) {
            updates.push(StreamUpdate::Positions(retain_open_positions(ours)));
        }
        updates
    }
}

impl WsCodec for BinanceOrderCodec {
    type Event = StreamUpdate;

    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe_frame(streams))
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        let Some(value) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };

        match value.get("e").and_then(Value::as_str) {
            Some("ORDER_TRADE_UPDATE") => {
                let update: BinanceWsOrderUpdate = parse_event(value, "order update")?;
                if !self.instrument.is_native(&update.order.symbol) {
                    return Ok(Decoded::Ignore);
                }
                let order =
                    conversions::convert_ws_order(&update.order, &self.instrument, update.event_time);
                Ok(Decoded::Events(vec![StreamUpdate::Order(order)]))
            }
            Some("ACCOUNT_UPDATE") => {
                let update: BinanceWsAccountUpdate = parse_event(value, "account update")?;
                Ok(Decoded::Events(self.account_updates(&update)))
            }
            Some("listenKeyExpired") => Ok(Decoded::Reconnect("listen key expired".to_string())),
            _ => Ok(Decoded::Ignore),
        }
    }
}

/// Public kline stream for one interval.
pub struct BinanceKlineCodec {
    interval: KlineInterval,
}

impl BinanceKlineCodec {
    pub const fn new(interval: KlineInterval) -> Self {
        Self { interval }
    }

    /// `<symbol>@kline_<interval>` stream name.
    pub fn stream_name(native: &str, code: &str) -> String {
        format!("{}@kline_{}", native.to_lowercase(), code)
    }
}

impl WsCodec for BinanceKlineCodec {
    type Event = Candle;

    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        Ok(subscribe_frame(streams))
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        let Some(value) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };

        if value.get("id").is_some() && value.get("result").is_some() {
            return Ok(Decoded::Subscribed);
        }
        // Combined-stream envelope
        let value = match value.get("data") {
            Some(data) => data.clone(),
            None => value,
        };
        if value.get("e").and_then(Value::as_str) != Some("kline") {
            return Ok(Decoded::Ignore);
        }

        let event: BinanceWsKlineEvent = parse_event(value, "kline")?;
        let k = event.kline;
        Ok(Decoded::Events(vec![Candle {
            symbol: SYMBOLS.to_generic(&event.symbol),
            interval: self.interval,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            volume: k.volume,
            timestamp: k.open_time,
            is_closed: k.is_closed,
        }]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderStatus;
    use rust_decimal::Decimal;

    fn order_codec() -> BinanceOrderCodec {
        BinanceOrderCodec::new(Arc::new(Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()))
    }

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    fn order_update(symbol: &str, status: &str) -> Message {
        text(json!({
            "e": "ORDER_TRADE_UPDATE",
            "E": 1_568_879_465_651_i64,
            "T": 1_568_879_465_650_i64,
            "o": {
                "s": symbol, "c": "TEST", "S": "SELL", "o": "LIMIT",
                "q": "0.001", "p": "9910", "ap": "9910", "X": status,
                "i": 8_886_774, "z": "0.0005", "T": 1_568_879_465_650_i64
            }
        }))
    }

    #[test]
    fn test_order_update_is_normalized() {
        let decoded = order_codec().decode_message(order_update("BTCUSDT", "FILLED")).unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        let StreamUpdate::Order(order) = &events[0] else {
            panic!("expected order");
        };
        assert_eq!(order.order_id, "8886774");
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_quantity, order.quantity);
    }

    #[test]
    fn test_other_symbols_are_ignored() {
        let decoded = order_codec().decode_message(order_update("ETHUSDT", "NEW")).unwrap();
        assert!(matches!(decoded, Decoded::Ignore));
    }

    #[test]
    fn test_account_update_emits_balance_and_flat_position() {
        let decoded = order_codec()
            .decode_message(text(json!({
                "e": "ACCOUNT_UPDATE",
                "a": {
                    "B": [{"a": "USDT", "wb": "122.6", "cw": "100.1"}],
                    "P": [{"s": "BTCUSDT", "pa": "0", "ep": "0", "up": "0", "mt": "cross"}]
                }
            })))
            .unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamUpdate::Balance(b) if b.total == Decimal::new(1226, 1)));
        assert!(matches!(&events[1], StreamUpdate::Positions(p) if p.is_empty()));
    }

    #[test]
    fn test_listen_key_expiry_forces_reconnect() {
        let decoded = order_codec()
            .decode_message(text(json!({"e": "listenKeyExpired", "E": 1})))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(_)));
    }

    #[test]
    fn test_provisional_candles_are_all_delivered() {
        let codec = BinanceKlineCodec::new(KlineInterval::Minutes1);
        let frame = |close: &str, closed: bool| {
            text(json!({
                "e": "kline", "E": 1, "s": "BTCUSDT",
                "k": {"t": 1_700_000_000_000_i64, "i": "1m", "o": "1", "h": "3", "l": "1",
                      "c": close, "v": "10", "x": closed}
            }))
        };

        let mut candles = Vec::new();
        for (close, closed) in [("2", false), ("2.5", false), ("2.4", true)] {
            if let Decoded::Events(events) = codec.decode_message(frame(close, closed)).unwrap() {
                candles.extend(events);
            }
        }
        assert_eq!(candles.len(), 3);
        assert!(candles.iter().all(|c| c.timestamp == 1_700_000_000_000));
        assert_eq!(candles.iter().filter(|c| c.is_closed).count(), 1);
        assert_eq!(candles[0].symbol, "BTCUSDT");
    }

    #[test]
    fn test_subscription_frame() {
        let frame = BinanceKlineCodec::new(KlineInterval::Hours1)
            .encode_subscription(&[BinanceKlineCodec::stream_name("BTCUSDT", "1h")])
            .unwrap();
        assert_eq!(
            frame,
            Message::Text(r#"{"id":1,"method":"SUBSCRIBE","params":["btcusdt@kline_1h"]}"#.to_string())
        );
    }
}
