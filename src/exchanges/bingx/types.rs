use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// `{code, msg, data}` envelope; `code` 0 is success.
#[derive(Debug, Deserialize)]
pub struct BingxResponse {
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

/// Error body of a non-2xx answer.
#[derive(Debug, Deserialize)]
pub struct BingxErrorBody {
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxContract {
    pub symbol: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub price_precision: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub quantity_precision: i64,
}

/// REST order; quantities are in base asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxOrder {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    pub symbol: String,
    #[serde(default, alias = "clientOrderID")]
    pub client_order_id: String,
    #[serde(default)]
    pub side: String,
    #[serde(default, rename = "type")]
    pub order_type: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub orig_qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub executed_qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_price: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub update_time: i64,
}

/// `data` of single-order calls: `{order: {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BingxOrderEnvelope {
    pub order: BingxOrder,
}

/// `data` of list calls: `{orders: [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BingxOrderList {
    #[serde(default)]
    pub orders: Vec<BingxOrder>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxCancelFailure {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub error_code: i64,
    #[serde(default)]
    pub error_message: String,
}

/// Batch cancel answer split into canceled orders and failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BingxCancelBatch {
    #[serde(default)]
    pub success: Vec<BingxOrder>,
    #[serde(default)]
    pub failed: Vec<BingxCancelFailure>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxBalance {
    #[serde(default)]
    pub asset: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub equity: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealized_profit: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available_margin: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BingxBalanceEnvelope {
    pub balance: BingxBalance,
}

/// `positionSide` is LONG/SHORT in hedge mode and BOTH in one-way mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxPosition {
    pub symbol: String,
    #[serde(default)]
    pub position_side: String,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub position_amt: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealized_profit: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub leverage: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BingxKline {
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub time: i64,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub open: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub high: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub low: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub close: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub volume: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxPremiumIndex {
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub last_funding_rate: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub next_funding_time: i64,
}

/// Returned bare, without the envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingxListenKey {
    pub listen_key: String,
}

/// `o` of an `ORDER_TRADE_UPDATE` event.
#[derive(Debug, Clone, Deserialize)]
pub struct BingxWsOrder {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", default)]
    pub client_order_id: String,
    #[serde(rename = "i", deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(rename = "S", default)]
    pub side: String,
    #[serde(rename = "o", default)]
    pub order_type: String,
    #[serde(rename = "q", default, deserialize_with = "serde_helpers::decimal")]
    pub quantity: Decimal,
    #[serde(rename = "p", default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(rename = "ap", default, deserialize_with = "serde_helpers::decimal")]
    pub average_price: Decimal,
    #[serde(rename = "X", default)]
    pub status: String,
    #[serde(rename = "z", default, deserialize_with = "serde_helpers::decimal")]
    pub filled: Decimal,
    #[serde(rename = "T", default, deserialize_with = "serde_helpers::i64_lenient")]
    pub trade_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BingxWsOrderUpdate {
    #[serde(rename = "E", default, deserialize_with = "serde_helpers::i64_lenient")]
    pub event_time: i64,
    #[serde(rename = "o")]
    pub order: BingxWsOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BingxWsBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "wb", default, deserialize_with = "serde_helpers::decimal")]
    pub wallet_balance: Decimal,
    #[serde(rename = "cw", default, deserialize_with = "serde_helpers::decimal")]
    pub cross_wallet_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BingxWsPosition {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "pa", default, deserialize_with = "serde_helpers::decimal")]
    pub amount: Decimal,
    #[serde(rename = "ep", default, deserialize_with = "serde_helpers::decimal")]
    pub entry_price: Decimal,
    #[serde(rename = "up", default, deserialize_with = "serde_helpers::decimal")]
    pub unrealized_pnl: Decimal,
    #[serde(rename = "mt", default)]
    pub margin_type: String,
    #[serde(rename = "ps", default)]
    pub position_side: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BingxWsAccountData {
    #[serde(rename = "B", default)]
    pub balances: Vec<BingxWsBalance>,
    #[serde(rename = "P", default)]
    pub positions: Vec<BingxWsPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BingxWsAccountUpdate {
    #[serde(rename = "a", default)]
    pub data: BingxWsAccountData,
}

/// One bar of a `<symbol>@kline_<interval>` push; `T` is the open time.
#[derive(Debug, Clone, Deserialize)]
pub struct BingxWsCandle {
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub o: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub h: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub l: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub c: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub v: Decimal,
    #[serde(rename = "T", deserialize_with = "serde_helpers::i64_lenient")]
    pub open_time: i64,
}
