use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::{retain_open_positions, CandleCloser};
use crate::core::symbols::Instrument;
use crate::core::types::{Candle, KlineInterval, StreamUpdate};
use crate::exchanges::mexc::conversions::{
    convert_balance, convert_order, convert_position, convert_ws_candle,
};
use crate::exchanges::mexc::types::{MexcAsset, MexcOrder, MexcPosition, MexcWsCandle, MexcWsFrame};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Private pushes kept by the personal filter after login.
pub const PRIVATE_FILTERS: [&str; 3] = ["order", "position", "asset"];

fn ping() -> Message {
    json_frame(&json!({ "method": "ping" }))
}

fn parse_frame(message: &Message) -> Result<Option<MexcWsFrame>, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad MEXC frame: {}", e)))
}

fn parse_data<T: DeserializeOwned>(data: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(data)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad MEXC payload: {}", e)))
}

/// Acks carry `"success"` in `data`; anything else is the failure reason.
fn acked(data: &Value) -> bool {
    data.as_str() == Some("success")
}

/// Private order, position and asset pushes of one contract.
///
/// MEXC pushes every private event after login; the personal filter
/// narrows order and position pushes to the bound contract.
pub struct MexcOrderCodec {
    instrument: Arc<Instrument>,
}

impl MexcOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    fn updates(&self, frame: MexcWsFrame) -> Result<Vec<StreamUpdate>, ExchangeError> {
        match frame.channel.as_str() {
            "push.personal.order" => {
                let order: MexcOrder = parse_data(frame.data)?;
                if !self.instrument.is_native(&order.symbol) {
                    return Ok(Vec::new());
                }
                Ok(vec![StreamUpdate::Order(convert_order(&order, &self.instrument))])
            }
            "push.personal.position" => {
                let position: MexcPosition = parse_data(frame.data)?;
                if !self.instrument.is_native(&position.symbol) {
                    return Ok(Vec::new());
                }
                let converted = convert_position(&position, &self.instrument);
                Ok(vec![StreamUpdate::Positions(retain_open_positions(vec![converted]))])
            }
            "push.personal.asset" => {
                let asset: MexcAsset = parse_data(frame.data)?;
                Ok(vec![StreamUpdate::Balance(convert_balance(&asset))])
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl WsCodec for MexcOrderCodec {
    type Event = StreamUpdate;

    /// `personal.filter` for the given push kinds.
    fn encode_subscription(&self, filters: &[String]) -> Result<Message, ExchangeError> {
        let filters: Vec<Value> = filters
            .iter()
            .map(|filter| match filter.as_str() {
                "asset" => json!({ "filter": "asset" }),
                _ => json!({ "filter": filter, "rules": [self.instrument.native] }),
            })
            .collect();
        Ok(json_frame(&json!({
            "method": "personal.filter",
            "param": { "filters": filters }
        })))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        let Some(frame) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };
        match frame.channel.as_str() {
            "pong" => Ok(Decoded::Ignore),
            "rs.login" if acked(&frame.data) => {
                let filters: Vec<String> = PRIVATE_FILTERS.iter().map(|f| f.to_string()).collect();
                Ok(Decoded::LoggedIn(vec![self.encode_subscription(&filters)?]))
            }
            "rs.personal.filter" if acked(&frame.data) => Ok(Decoded::Subscribed),
            "rs.login" | "rs.personal.filter" | "rs.error" => Ok(Decoded::Reconnect(format!(
                "{}: {}",
                frame.channel, frame.data
            ))),
            _ => Ok(Decoded::Events(self.updates(frame)?)),
        }
    }
}

/// Public `push.kline`; MEXC never flags closed bars.
pub struct MexcKlineCodec {
    interval: KlineInterval,
    code: &'static str,
    instrument: Arc<Instrument>,
    closer: CandleCloser,
}

impl MexcKlineCodec {
    /// `instrument` supplies the contract size used to convert volumes.
    pub fn new(interval: KlineInterval, code: &'static str, instrument: Arc<Instrument>) -> Self {
        Self {
            interval,
            code,
            instrument,
            closer: CandleCloser::new(),
        }
    }
}

impl WsCodec for MexcKlineCodec {
    type Event = Candle;

    /// One frame per contract: `streams` is `[symbol]`.
    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        let symbol = streams.first().ok_or_else(|| {
            ExchangeError::InvalidParameters("missing MEXC symbol".to_string())
        })?;
        Ok(json_frame(&json!({
            "method": "sub.kline",
            "param": { "symbol": symbol, "interval": self.code }
        })))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        let Some(frame) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };
        match frame.channel.as_str() {
            "push.kline" => {
                let candle: MexcWsCandle = parse_data(frame.data)?;
                let candle = convert_ws_candle(&candle, self.interval, &self.instrument.info);
                Ok(Decoded::Events(self.closer.observe(candle)))
            }
            "rs.sub.kline" if acked(&frame.data) => Ok(Decoded::Subscribed),
            "rs.sub.kline" | "rs.error" => {
                warn!(exchange = "mexc", channel = %frame.channel, data = %frame.data, "Candle stream error");
                Ok(Decoded::Ignore)
            }
            _ => Ok(Decoded::Ignore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderStatus;
    use crate::exchanges::mexc::conversions::SYMBOLS;

    fn instrument() -> Arc<Instrument> {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.0001".parse().unwrap());
        Arc::new(instrument)
    }

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    #[test]
    fn test_login_ack_sends_personal_filter() {
        let codec = MexcOrderCodec::new(instrument());
        let decoded = codec
            .decode_message(text(json!({"channel": "rs.login", "data": "success", "ts": 1})))
            .unwrap();
        let Decoded::LoggedIn(frames) = decoded else {
            panic!("expected login ack");
        };
        let Message::Text(frame) = &frames[0] else {
            panic!("expected text frame");
        };
        let frame: Value = serde_json::from_str(frame).unwrap();
        assert_eq!(frame["method"], "personal.filter");
        assert_eq!(frame["param"]["filters"][0], json!({"filter": "order", "rules": ["BTC_USDT"]}));
        assert_eq!(frame["param"]["filters"][2], json!({"filter": "asset"}));
    }

    #[test]
    fn test_login_failure_reconnects() {
        let codec = MexcOrderCodec::new(instrument());
        let decoded = codec
            .decode_message(text(json!({"channel": "rs.login", "data": "signature error"})))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(ref r) if r.contains("signature")));
    }

    #[test]
    fn test_order_push_for_other_contract_is_dropped() {
        let codec = MexcOrderCodec::new(instrument());
        let push = |symbol: &str| {
            text(json!({
                "channel": "push.personal.order",
                "data": {"orderId": "7", "symbol": symbol, "vol": 10, "dealVol": 10,
                         "side": 1, "orderType": 1, "state": 3, "createTime": 1, "updateTime": 2}
            }))
        };
        let Decoded::Events(events) = codec.decode_message(push("ETH_USDT")).unwrap() else {
            panic!("expected events");
        };
        assert!(events.is_empty());

        let Decoded::Events(events) = codec.decode_message(push("BTC_USDT")).unwrap() else {
            panic!("expected events");
        };
        let StreamUpdate::Order(order) = &events[0] else {
            panic!("expected order");
        };
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_quantity, "0.001".parse().unwrap());
    }

    #[test]
    fn test_pong_is_consumed() {
        let codec = MexcOrderCodec::new(instrument());
        let decoded = codec
            .decode_message(text(json!({"channel": "pong", "data": 1587453241453_i64})))
            .unwrap();
        assert!(matches!(decoded, Decoded::Ignore));
    }

    #[test]
    fn test_new_bucket_closes_previous_candle() {
        let codec = MexcKlineCodec::new(KlineInterval::Minutes1, "Min1", instrument());
        let push = |t: i64, c: f64| {
            text(json!({
                "channel": "push.kline",
                "data": {"symbol": "BTC_USDT", "interval": "Min1", "t": t,
                         "o": 100.0, "h": 110.0, "l": 90.0, "c": c, "q": 50},
                "symbol": "BTC_USDT"
            }))
        };
        let Decoded::Events(first) = codec.decode_message(push(1_700_000_000, 101.0)).unwrap() else {
            panic!("expected candles");
        };
        assert_eq!(first.len(), 1);
        assert!(!first[0].is_closed);

        let Decoded::Events(next) = codec.decode_message(push(1_700_000_060, 102.0)).unwrap() else {
            panic!("expected candles");
        };
        assert_eq!(next.len(), 2);
        assert!(next[0].is_closed);
        assert_eq!(next[0].symbol, "BTCUSDT");
        assert_eq!(next[0].close, "101".parse().unwrap());
        assert!(!next[1].is_closed);
    }
}
