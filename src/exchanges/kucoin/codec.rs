use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::{retain_open_positions, CandleCloser};
use crate::core::symbols::Instrument;
use crate::core::types::{Balance, Candle, KlineInterval, StreamUpdate, SymbolInfo};
use crate::exchanges::kucoin::conversions::{convert_position, convert_ws_candle, convert_ws_order};
use crate::exchanges::kucoin::types::{
    KucoinPosition, KucoinWsBalance, KucoinWsCandle, KucoinWsFrame, KucoinWsOrder,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

pub const WALLET_TOPIC: &str = "/contractAccount/wallet";

pub fn order_topic(native: &str) -> String {
    format!("/contractMarket/tradeOrders:{}", native)
}

pub fn position_topic(native: &str) -> String {
    format!("/contract/position:{}", native)
}

pub fn candle_topic(native: &str, code: &str) -> String {
    format!("/contractMarket/limitCandle:{}_{}", native, code)
}

/// `subscribe` for one topic; `id` is echoed in the ack.
pub fn subscribe_frame(id: usize, topic: &str, private: bool) -> Message {
    json_frame(&json!({
        "id": id.to_string(),
        "type": "subscribe",
        "topic": topic,
        "privateChannel": private,
        "response": true,
    }))
}

fn ping() -> Message {
    json_frame(&json!({
        "id": chrono::Utc::now().timestamp_millis().to_string(),
        "type": "ping",
    }))
}

fn parse_frame(message: &Message) -> Result<Option<KucoinWsFrame>, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad KuCoin frame: {}", e)))
}

fn parse_data<T: DeserializeOwned>(data: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(data)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad KuCoin payload: {}", e)))
}

/// Outcome of the control frames shared by both codecs.
enum Control {
    Handled(Decoded<()>),
    Message(KucoinWsFrame),
}

fn control(frame: KucoinWsFrame) -> Control {
    match frame.kind.as_str() {
        "welcome" | "pong" => Control::Handled(Decoded::Ignore),
        "ack" => Control::Handled(Decoded::Subscribed),
        "error" => Control::Handled(Decoded::Reconnect(format!(
            "KuCoin error {}: {}",
            frame.code, frame.data
        ))),
        "message" => Control::Message(frame),
        _ => Control::Handled(Decoded::Ignore),
    }
}

fn lift<E>(decoded: Decoded<()>) -> Decoded<E> {
    match decoded {
        Decoded::Subscribed => Decoded::Subscribed,
        Decoded::Reconnect(reason) => Decoded::Reconnect(reason),
        _ => Decoded::Ignore,
    }
}

/// Private order, position and wallet topics of one contract.
pub struct KucoinOrderCodec {
    instrument: Arc<Instrument>,
}

impl KucoinOrderCodec {
    pub fn new(instrument: Arc<Instrument>) -> Self {
        Self { instrument }
    }

    /// Topics subscribed on every connection.
    pub fn topics(&self) -> Vec<String> {
        vec![
            order_topic(&self.instrument.native),
            position_topic(&self.instrument.native),
            WALLET_TOPIC.to_string(),
        ]
    }

    fn updates(&self, frame: KucoinWsFrame) -> Result<Vec<StreamUpdate>, ExchangeError> {
        match frame.subject.as_str() {
            "orderChange" => {
                let order: KucoinWsOrder = parse_data(frame.data)?;
                if !self.instrument.is_native(&order.symbol) {
                    return Ok(Vec::new());
                }
                Ok(vec![StreamUpdate::Order(convert_ws_order(&order, &self.instrument))])
            }
            "position.change" => {
                let position: KucoinPosition = parse_data(frame.data)?;
                // Mark-price ticks carry no quantity
                if position.current_qty.is_none() {
                    return Ok(Vec::new());
                }
                if !position.symbol.is_empty() && !self.instrument.is_native(&position.symbol) {
                    return Ok(Vec::new());
                }
                Ok(vec![StreamUpdate::Positions(retain_open_positions(vec![
                    convert_position(&position, &self.instrument),
                ]))])
            }
            "availableBalance.change" => {
                let balance: KucoinWsBalance = parse_data(frame.data)?;
                Ok(vec![StreamUpdate::Balance(Balance {
                    asset: balance.currency.to_ascii_uppercase(),
                    total: balance.available_balance + balance.hold_balance,
                    available: balance.available_balance,
                })])
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl WsCodec for KucoinOrderCodec {
    type Event = StreamUpdate;

    /// KuCoin subscribes one topic per frame; `topics[0]` is used.
    fn encode_subscription(&self, topics: &[String]) -> Result<Message, ExchangeError> {
        let topic = topics
            .first()
            .ok_or_else(|| ExchangeError::InvalidParameters("missing KuCoin topic".to_string()))?;
        Ok(subscribe_frame(1, topic, true))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        let Some(frame) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };
        match control(frame) {
            Control::Handled(decoded) => Ok(lift(decoded)),
            Control::Message(frame) => Ok(Decoded::Events(self.updates(frame)?)),
        }
    }
}

/// Public candle topics; closes buckets when the next one starts.
pub struct KucoinKlineCodec {
    interval: KlineInterval,
    instrument: Arc<Instrument>,
    closer: CandleCloser,
}

impl KucoinKlineCodec {
    pub fn new(interval: KlineInterval, instrument: Arc<Instrument>) -> Self {
        Self {
            interval,
            instrument,
            closer: CandleCloser::new(),
        }
    }
}

impl WsCodec for KucoinKlineCodec {
    type Event = Candle;

    fn encode_subscription(&self, topics: &[String]) -> Result<Message, ExchangeError> {
        let topic = topics
            .first()
            .ok_or_else(|| ExchangeError::InvalidParameters("missing KuCoin topic".to_string()))?;
        Ok(subscribe_frame(1, topic, false))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        let Some(frame) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };
        let frame = match control(frame) {
            Control::Handled(Decoded::Reconnect(reason)) => {
                warn!(exchange = "kucoin", reason = %reason, "Candle stream error");
                return Ok(Decoded::Ignore);
            }
            Control::Handled(decoded) => return Ok(lift(decoded)),
            Control::Message(frame) => frame,
        };
        if frame.subject != "candle.stick" {
            return Ok(Decoded::Ignore);
        }
        let candle: KucoinWsCandle = parse_data(frame.data)?;
        // Lot sizes are known for the bound contract only
        let info = if self.instrument.is_native(&candle.symbol) {
            self.instrument.info.clone()
        } else {
            SymbolInfo {
                contract_size: None,
                ..self.instrument.info.clone()
            }
        };
        Ok(Decoded::Events(
            convert_ws_candle(&candle, self.interval, &info)
                .map(|c| self.closer.observe(c))
                .unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::kucoin::conversions::SYMBOLS;

    fn instrument() -> Arc<Instrument> {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.001".parse().unwrap());
        Arc::new(instrument)
    }

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    #[test]
    fn test_control_frames() {
        let codec = KucoinOrderCodec::new(instrument());
        assert!(matches!(
            codec.decode_message(text(json!({"id": "a", "type": "welcome"}))).unwrap(),
            Decoded::Ignore
        ));
        assert!(matches!(
            codec.decode_message(text(json!({"id": "1", "type": "ack"}))).unwrap(),
            Decoded::Subscribed
        ));
        assert!(matches!(
            codec.decode_message(text(json!({"id": "1", "type": "error", "code": 401, "data": "token is expired"}))).unwrap(),
            Decoded::Reconnect(_)
        ));
    }

    #[test]
    fn test_mark_price_ticks_are_skipped() {
        let codec = KucoinOrderCodec::new(instrument());
        let decoded = codec
            .decode_message(text(json!({
                "type": "message", "topic": "/contract/position:XBTUSDTM", "subject": "position.change",
                "data": {"markPrice": 7947.83, "markValue": 0.00251640, "changeReason": "markPriceChange"}
            })))
            .unwrap();
        assert!(matches!(decoded, Decoded::Events(ref e) if e.is_empty()));
    }

    #[test]
    fn test_wallet_change() {
        let codec = KucoinOrderCodec::new(instrument());
        let decoded = codec
            .decode_message(text(json!({
                "type": "message", "topic": WALLET_TOPIC, "subject": "availableBalance.change",
                "data": {"availableBalance": "5923", "holdBalance": "77", "currency": "USDT"}
            })))
            .unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        assert_eq!(
            events,
            vec![StreamUpdate::Balance(Balance {
                asset: "USDT".to_string(),
                total: "6000".parse().unwrap(),
                available: "5923".parse().unwrap(),
            })]
        );
    }

    #[test]
    fn test_candles_close_on_rollover() {
        let codec = KucoinKlineCodec::new(KlineInterval::Minutes1, instrument());
        let push = |ts: &str| {
            text(json!({
                "type": "message", "topic": "/contractMarket/limitCandle:XBTUSDTM_1min",
                "subject": "candle.stick",
                "data": {"symbol": "XBTUSDTM", "candles": [ts, "1", "2", "3", "0.5", "10", "20"], "time": 1}
            }))
        };
        let Decoded::Events(first) = codec.decode_message(push("1589968800")).unwrap() else {
            panic!("expected candles");
        };
        assert_eq!(first.len(), 1);
        assert!(!first[0].is_closed);
        let Decoded::Events(next) = codec.decode_message(push("1589968860")).unwrap() else {
            panic!("expected candles");
        };
        assert_eq!(next.len(), 2);
        assert!(next[0].is_closed);
        assert_eq!(next[0].timestamp, 1_589_968_800_000);
    }
}
