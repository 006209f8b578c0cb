use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{frame_text, json_frame};
use crate::core::kernel::{Decoded, WsCodec};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::types::{Balance, Candle, KlineInterval, StreamUpdate, SymbolInfo};
use crate::exchanges::gate::conversions::{convert_candle, convert_order, convert_position, SYMBOLS};
use crate::exchanges::gate::signer::GateSigner;
use crate::exchanges::gate::types::{GateCandle, GateOrder, GatePosition, GateWsBalance, GateWsFrame};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

pub const ORDERS: &str = "futures.orders";
pub const POSITIONS: &str = "futures.positions";
pub const BALANCES: &str = "futures.balances";
pub const CANDLES: &str = "futures.candlesticks";

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// One `subscribe` frame; Gate takes a single channel per frame.
pub fn subscribe_frame(channel: &str, payload: &[String], auth: Option<Value>, time: u64) -> Message {
    let mut frame = json!({
        "time": time,
        "channel": channel,
        "event": "subscribe",
        "payload": payload,
    });
    if let Some(auth) = auth {
        frame["auth"] = auth;
    }
    json_frame(&frame)
}

/// Signed subscription to a private channel.
pub fn private_subscription(
    signer: &GateSigner,
    channel: &str,
    payload: &[String],
) -> Result<Message, ExchangeError> {
    let time = now_secs();
    let auth = signer.ws_auth(channel, "subscribe", time)?;
    Ok(subscribe_frame(channel, payload, Some(auth), time))
}

fn ping() -> Message {
    json_frame(&json!({ "time": now_secs(), "channel": "futures.ping" }))
}

fn parse_frame(message: &Message) -> Result<Option<GateWsFrame>, ExchangeError> {
    let Some(text) = frame_text(message) else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad Gate frame: {}", e)))
}

fn parse_result<T: DeserializeOwned>(result: Value) -> Result<Vec<T>, ExchangeError> {
    serde_json::from_value(result)
        .map_err(|e| ExchangeError::DeserializationError(format!("Bad Gate payload: {}", e)))
}

/// Private `futures.orders`, `futures.positions` and `futures.balances`.
pub struct GateOrderCodec {
    instrument: Arc<Instrument>,
    signer: Arc<GateSigner>,
}

impl GateOrderCodec {
    pub fn new(instrument: Arc<Instrument>, signer: Arc<GateSigner>) -> Self {
        Self { instrument, signer }
    }

    fn updates(&self, frame: GateWsFrame) -> Result<Vec<StreamUpdate>, ExchangeError> {
        match frame.channel.as_str() {
            ORDERS => {
                let orders: Vec<GateOrder> = parse_result(frame.result)?;
                Ok(orders
                    .iter()
                    .filter(|o| self.instrument.is_native(&o.contract))
                    .map(|o| StreamUpdate::Order(convert_order(o, &self.instrument)))
                    .collect())
            }
            POSITIONS => {
                let positions: Vec<GatePosition> = parse_result(frame.result)?;
                let ours: Vec<_> = positions
                    .iter()
                    .filter(|p| self.instrument.is_native(&p.contract))
                    .map(|p| convert_position(p, &self.instrument))
                    .collect();
                if ours.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![StreamUpdate::Positions(retain_open_positions(ours))])
            }
            // Balance pushes carry the wallet total only
            BALANCES => {
                let balances: Vec<GateWsBalance> = parse_result(frame.result)?;
                Ok(balances
                    .iter()
                    .map(|b| {
                        let asset = if b.currency.is_empty() {
                            self.instrument.info.quote_asset.clone()
                        } else {
                            b.currency.to_ascii_uppercase()
                        };
                        StreamUpdate::Balance(Balance {
                            asset,
                            total: b.balance,
                            available: b.balance,
                        })
                    })
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl WsCodec for GateOrderCodec {
    type Event = StreamUpdate;

    /// `streams` is `[channel, payload...]`.
    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        let (channel, payload) = streams.split_first().ok_or_else(|| {
            ExchangeError::InvalidParameters("missing Gate channel".to_string())
        })?;
        private_subscription(&self.signer, channel, payload)
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<StreamUpdate>, ExchangeError> {
        let Some(frame) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };
        match frame.event.as_str() {
            "subscribe" => match &frame.error {
                Some(error) => Ok(Decoded::Reconnect(format!(
                    "{} subscribe failed {}: {}",
                    frame.channel, error.code, error.message
                ))),
                None => Ok(Decoded::Subscribed),
            },
            "update" => Ok(Decoded::Events(self.updates(frame)?)),
            _ => Ok(Decoded::Ignore),
        }
    }
}

/// Public `futures.candlesticks`; the `w` flag marks closed windows.
pub struct GateKlineCodec {
    interval: KlineInterval,
    code: &'static str,
    instrument: Arc<Instrument>,
}

impl GateKlineCodec {
    /// `instrument` supplies the contract size used to convert volumes.
    pub fn new(interval: KlineInterval, code: &'static str, instrument: Arc<Instrument>) -> Self {
        Self {
            interval,
            code,
            instrument,
        }
    }
}

impl WsCodec for GateKlineCodec {
    type Event = Candle;

    /// One frame per contract: `streams` is `[contract]`.
    fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
        let contract = streams.first().ok_or_else(|| {
            ExchangeError::InvalidParameters("missing Gate contract".to_string())
        })?;
        Ok(subscribe_frame(
            CANDLES,
            &[self.code.to_string(), contract.clone()],
            None,
            now_secs(),
        ))
    }

    fn heartbeat(&self) -> Message {
        ping()
    }

    fn decode_message(&self, message: Message) -> Result<Decoded<Candle>, ExchangeError> {
        let Some(frame) = parse_frame(&message)? else {
            return Ok(Decoded::Ignore);
        };
        if frame.channel != CANDLES {
            return Ok(Decoded::Ignore);
        }
        match frame.event.as_str() {
            "subscribe" => {
                if let Some(error) = &frame.error {
                    warn!(exchange = "gate", code = error.code, msg = %error.message, "Candle subscription rejected");
                    return Ok(Decoded::Ignore);
                }
                Ok(Decoded::Subscribed)
            }
            "update" => {
                let candles: Vec<GateCandle> = parse_result(frame.result)?;
                Ok(Decoded::Events(
                    candles
                        .iter()
                        .filter_map(|c| {
                            let (code, contract) = c.n.split_once('_')?;
                            (code == self.code).then(|| {
                                let symbol = SYMBOLS.to_generic(contract);
                                // Other contracts lack metadata; only ours converts volume
                                let info = if self.instrument.is_native(contract) {
                                    self.instrument.info.clone()
                                } else {
                                    SymbolInfo {
                                        contract_size: None,
                                        ..self.instrument.info.clone()
                                    }
                                };
                                convert_candle(c, &symbol, self.interval, &info)
                            })
                        })
                        .collect(),
                ))
            }
            _ => Ok(Decoded::Ignore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Credentials;
    use crate::core::types::OrderStatus;

    fn instrument() -> Arc<Instrument> {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.0001".parse().unwrap());
        Arc::new(instrument)
    }

    fn order_codec() -> GateOrderCodec {
        let signer = GateSigner::new(Credentials {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: String::new(),
        });
        GateOrderCodec::new(instrument(), Arc::new(signer))
    }

    fn text(value: Value) -> Message {
        Message::Text(value.to_string())
    }

    #[test]
    fn test_private_subscription_is_signed() {
        let frame = order_codec()
            .encode_subscription(&[ORDERS.to_string(), "10001".to_string(), "BTC_USDT".to_string()])
            .unwrap();
        let Message::Text(frame) = frame else {
            panic!("expected text frame");
        };
        let frame: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(frame["payload"], json!(["10001", "BTC_USDT"]));
        assert_eq!(frame["auth"]["method"], "api_key");
        assert_eq!(frame["auth"]["SIGN"].as_str().unwrap().len(), 128);
    }

    #[test]
    fn test_auth_failure_reconnects() {
        let decoded = order_codec()
            .decode_message(text(json!({
                "time": 1, "channel": ORDERS, "event": "subscribe",
                "error": {"code": 2, "message": "invalid signature"}, "result": null
            })))
            .unwrap();
        assert!(matches!(decoded, Decoded::Reconnect(_)));
    }

    #[test]
    fn test_order_update_for_other_contract_is_dropped() {
        let decoded = order_codec()
            .decode_message(text(json!({
                "time": 1, "channel": ORDERS, "event": "update",
                "result": [
                    {"id": 1, "contract": "ETH_USDT", "size": 1, "left": 1, "status": "open"},
                    {"id": 2, "contract": "BTC_USDT", "size": 10, "left": 0, "price": "30000",
                     "status": "finished", "finish_as": "filled", "create_time": 1}
                ]
            })))
            .unwrap();
        let Decoded::Events(events) = decoded else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 1);
        let StreamUpdate::Order(order) = &events[0] else {
            panic!("expected order");
        };
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.executed_quantity, "0.001".parse().unwrap());
    }

    #[test]
    fn test_closed_position_yields_empty_snapshot() {
        let decoded = order_codec()
            .decode_message(text(json!({
                "time": 1, "channel": POSITIONS, "event": "update",
                "result": [{"contract": "BTC_USDT", "size": 0, "entry_price": "0", "leverage": "10"}]
            })))
            .unwrap();
        assert!(matches!(decoded, Decoded::Events(ref e) if e == &vec![StreamUpdate::Positions(Vec::new())]));
    }

    #[test]
    fn test_candle_window_flag() {
        let codec = GateKlineCodec::new(KlineInterval::Minutes1, "1m", instrument());
        let decoded = codec
            .decode_message(text(json!({
                "time": 1, "channel": CANDLES, "event": "update",
                "result": [{"t": 1545129300, "v": 27525555, "c": "95.4", "h": "96.9",
                            "l": "89.5", "o": "94.3", "n": "1m_BTC_USDT", "w": true}]
            })))
            .unwrap();
        let Decoded::Events(candles) = decoded else {
            panic!("expected candles");
        };
        assert_eq!(candles[0].symbol, "BTCUSDT");
        assert_eq!(candles[0].timestamp, 1_545_129_300_000);
        assert!(candles[0].is_closed);
        assert_eq!(candles[0].volume, "2752.5555".parse().unwrap());
    }
}
