use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// `{success, code, message, data}` envelope of every REST answer.
#[derive(Debug, Deserialize)]
pub struct MexcResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// Error body of a non-2xx answer.
#[derive(Debug, Deserialize)]
pub struct MexcErrorBody {
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcContract {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    /// Base-asset amount of one contract.
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub contract_size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price_unit: Decimal,
    /// Smallest contract step.
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub vol_unit: Decimal,
}

/// Order as returned by REST and pushed on `push.personal.order`.
///
/// `side`: 1 open long, 2 close short, 3 open short, 4 close long.
/// `orderType`: 1 limit, 2 post-only, 3 IOC, 4 FOK, 5 market.
/// `state`: 1 uninformed, 2 live, 3 filled, 4 canceled, 5 invalid.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcOrder {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    pub symbol: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub vol: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub deal_vol: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub deal_avg_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub side: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub order_type: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub state: i64,
    #[serde(default)]
    pub external_oid: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub create_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub update_time: i64,
}

/// One entry of a cancel answer; `errorCode` 0 means canceled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcCancelItem {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub error_code: i64,
    #[serde(default)]
    pub error_msg: String,
}

/// Futures asset of one currency; REST and `push.personal.asset`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcAsset {
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub position_margin: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub frozen_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub cash_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub equity: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealized: Decimal,
}

/// `positionType` 1 long / 2 short, `openType` 1 isolated / 2 cross.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcPosition {
    pub symbol: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub hold_vol: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub position_type: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub open_type: i64,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub hold_avg_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub leverage: Decimal,
}

/// Column-oriented candles; `time` is in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MexcKlines {
    #[serde(default)]
    pub time: Vec<Value>,
    #[serde(default)]
    pub open: Vec<Value>,
    #[serde(default)]
    pub close: Vec<Value>,
    #[serde(default)]
    pub high: Vec<Value>,
    #[serde(default)]
    pub low: Vec<Value>,
    #[serde(default)]
    pub vol: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcFunding {
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub funding_rate: Decimal,
    /// Milliseconds.
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub next_settle_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcTicker {
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub fair_price: Decimal,
}

/// Every WebSocket frame: `{channel, data, symbol?, ts?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MexcWsFrame {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

/// `push.kline` payload; `t` is in seconds and `q` in contracts.
#[derive(Debug, Clone, Deserialize)]
pub struct MexcWsCandle {
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub t: i64,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub o: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub h: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub l: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub c: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub q: Decimal,
}
