use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// v2 envelope: `{code: "00000", msg, requestTime, data}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetResponse {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetContract {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    /// Price decimals.
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub price_place: i64,
    /// Size decimals.
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub volume_place: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetOrderAck {
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(default)]
    pub client_oid: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetBatchFailure {
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(default)]
    pub client_oid: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub error_code: String,
    #[serde(default)]
    pub error_msg: String,
}

/// Batch place/cancel outcome, keyed by `clientOid`/`orderId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetBatchResult {
    #[serde(default)]
    pub success_list: Vec<BitgetOrderAck>,
    #[serde(default)]
    pub failure_list: Vec<BitgetBatchFailure>,
}

/// Order details. The stream spells a few fields differently.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetOrder {
    #[serde(alias = "instId")]
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(default)]
    pub client_oid: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub size: Decimal,
    #[serde(default, alias = "accBaseVolume", deserialize_with = "serde_helpers::decimal")]
    pub base_volume: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price_avg: Decimal,
    pub side: String,
    pub order_type: String,
    #[serde(alias = "status")]
    pub state: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub c_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub u_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetPendingOrders {
    /// `null` when nothing is open.
    #[serde(default)]
    pub entrusted_list: Option<Vec<BitgetOrder>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetAccount {
    pub margin_coin: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available: Decimal,
    #[serde(default, alias = "equity", deserialize_with = "serde_helpers::decimal")]
    pub account_equity: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub usdt_equity: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub crossed_max_available: Decimal,
    #[serde(default, alias = "unrealizedPL", deserialize_with = "serde_helpers::decimal")]
    pub unrealized_pl: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetPosition {
    #[serde(alias = "instId")]
    pub symbol: String,
    /// `long` or `short`.
    pub hold_side: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub total: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub open_price_avg: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(rename = "unrealizedPL", default, deserialize_with = "serde_helpers::decimal")]
    pub unrealized_pl: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub leverage: Decimal,
    /// `crossed` or `isolated`.
    #[serde(default)]
    pub margin_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetFundingRate {
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub funding_rate: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub next_update: i64,
}

/// `[ts, open, high, low, close, baseVolume, quoteVolume]`, oldest first.
pub type BitgetCandleRow = Vec<Value>;

// WebSocket payloads

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetWsArg {
    pub channel: String,
    #[serde(default)]
    pub inst_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitgetWsPush {
    pub arg: BitgetWsArg,
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitgetWsEvent {
    pub event: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub code: String,
    #[serde(default)]
    pub msg: String,
}
