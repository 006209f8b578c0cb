use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// v5 envelope: `{retCode, retMsg, result, retExtInfo}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitResponse {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub ret_ext_info: Value,
}

/// Paged result wrapper used by most list endpoints.
#[derive(Debug, Deserialize)]
pub struct BybitList<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitPriceFilter {
    pub tick_size: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitLotSizeFilter {
    pub qty_step: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitInstrument {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    pub price_filter: BybitPriceFilter,
    pub lot_size_filter: BybitLotSizeFilter,
}

/// Order details; the REST and `order` topic shapes agree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrder {
    pub symbol: String,
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
    pub side: String,
    pub order_type: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub cum_exec_qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_price: Decimal,
    pub order_status: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub created_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub updated_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrderAck {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// Per-item status of batch calls, parallel to `result.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitItemStatus {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitCoinBalance {
    pub coin: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub wallet_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub equity: Decimal,
    /// Empty on unified accounts since 2024; margin fields below take over.
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available_to_withdraw: Decimal,
    #[serde(rename = "totalPositionIM", default, deserialize_with = "serde_helpers::decimal")]
    pub total_position_im: Decimal,
    #[serde(rename = "totalOrderIM", default, deserialize_with = "serde_helpers::decimal")]
    pub total_order_im: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitWallet {
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub total_wallet_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub total_margin_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub total_available_balance: Decimal,
    #[serde(default)]
    pub coin: Vec<BybitCoinBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitPosition {
    pub symbol: String,
    /// `Buy`, `Sell`, or empty when flat.
    #[serde(default)]
    pub side: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub size: Decimal,
    /// `avgPrice` on REST, `entryPrice` on the stream.
    #[serde(default, alias = "entryPrice", deserialize_with = "serde_helpers::decimal")]
    pub avg_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealised_pnl: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub leverage: Decimal,
    /// 0 cross, 1 isolated.
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub trade_mode: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitTicker {
    pub symbol: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub funding_rate: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub next_funding_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
}

/// `[startTime, open, high, low, close, volume, turnover]`, newest first.
pub type BybitKlineRow = Vec<Value>;

// WebSocket payloads

/// Control reply: auth, subscribe and pong all share this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitWsReply {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BybitWsPush {
    pub topic: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitWsKline {
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub start: i64,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub open: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub high: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub low: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub close: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub volume: Decimal,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitWsWallet {
    #[serde(default)]
    pub coin: Vec<BybitCoinBalance>,
}
