use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Error body Binance returns with non-2xx responses and inside batch arrays.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub orig_qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub executed_qty: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_price: Decimal,
    pub status: String,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub update_time: i64,
}

/// One element of a batch response: an order or a per-item error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinanceBatchItem {
    Error(BinanceErrorBody),
    Order(Box<BinanceOrder>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceAccountInfo {
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub total_wallet_balance: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub total_margin_balance: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub available_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinancePositionRisk {
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub position_amt: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub entry_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(rename = "unRealizedProfit", deserialize_with = "serde_helpers::decimal")]
    pub unrealized_profit: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub leverage: Decimal,
    #[serde(default)]
    pub margin_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceBalance {
    pub asset: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub balance: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub available_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinancePremiumIndex {
    pub symbol: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub last_funding_rate: Decimal,
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub next_funding_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceExchangeInfo {
    pub symbols: Vec<BinanceSymbol>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceSymbol {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub price_precision: u32,
    pub quantity_precision: u32,
    #[serde(default)]
    pub filters: Vec<BinanceFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceFilter {
    pub filter_type: String,
    pub tick_size: Option<String>,
    pub step_size: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceListenKey {
    pub listen_key: String,
}

/// REST kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`.
pub type BinanceKlineRow = Vec<Value>;

// WebSocket payloads

/// `ORDER_TRADE_UPDATE` order object.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsOrder {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", default)]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "q", deserialize_with = "serde_helpers::decimal")]
    pub quantity: Decimal,
    #[serde(rename = "p", deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(rename = "ap", default, deserialize_with = "serde_helpers::decimal")]
    pub average_price: Decimal,
    #[serde(rename = "X")]
    pub status: String,
    #[serde(rename = "i", deserialize_with = "serde_helpers::string_or_number")]
    pub order_id: String,
    #[serde(rename = "z", deserialize_with = "serde_helpers::decimal")]
    pub filled: Decimal,
    #[serde(rename = "T", default, deserialize_with = "serde_helpers::i64_lenient")]
    pub trade_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsOrderUpdate {
    #[serde(rename = "E", default)]
    pub event_time: i64,
    #[serde(rename = "o")]
    pub order: BinanceWsOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "wb", deserialize_with = "serde_helpers::decimal")]
    pub wallet_balance: Decimal,
    #[serde(rename = "cw", deserialize_with = "serde_helpers::decimal")]
    pub cross_wallet_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsPosition {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "pa", deserialize_with = "serde_helpers::decimal")]
    pub amount: Decimal,
    #[serde(rename = "ep", deserialize_with = "serde_helpers::decimal")]
    pub entry_price: Decimal,
    #[serde(rename = "up", default, deserialize_with = "serde_helpers::decimal")]
    pub unrealized_pnl: Decimal,
    #[serde(rename = "mt", default)]
    pub margin_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsAccountData {
    #[serde(rename = "B", default)]
    pub balances: Vec<BinanceWsBalance>,
    #[serde(rename = "P", default)]
    pub positions: Vec<BinanceWsPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsAccountUpdate {
    #[serde(rename = "a")]
    pub data: BinanceWsAccountData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsKline {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o", deserialize_with = "serde_helpers::decimal")]
    pub open: Decimal,
    #[serde(rename = "h", deserialize_with = "serde_helpers::decimal")]
    pub high: Decimal,
    #[serde(rename = "l", deserialize_with = "serde_helpers::decimal")]
    pub low: Decimal,
    #[serde(rename = "c", deserialize_with = "serde_helpers::decimal")]
    pub close: Decimal,
    #[serde(rename = "v", deserialize_with = "serde_helpers::decimal")]
    pub volume: Decimal,
    #[serde(rename = "x")]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsKlineEvent {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinanceWsKline,
}
