use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// `{code, msg, data}`; success is `"200000"`.
#[derive(Debug, Deserialize)]
pub struct KucoinResponse {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinContract {
    pub symbol: String,
    pub base_currency: String,
    pub quote_currency: String,
    /// Base-asset amount per lot.
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub multiplier: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub tick_size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub funding_fee_rate: Decimal,
    /// Milliseconds until the next settlement.
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub next_funding_rate_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinOrderAck {
    pub order_id: String,
    #[serde(default)]
    pub client_oid: String,
}

/// REST order; `size` and `filledSize` are in lots.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinOrder {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub client_oid: Option<String>,
    #[serde(rename = "type", default)]
    pub order_type: String,
    pub side: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub filled_size: Decimal,
    /// Quote value of the filled part.
    #[serde(default, alias = "dealValue", deserialize_with = "serde_helpers::decimal")]
    pub filled_value: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub cancel_exist: bool,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KucoinPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinAccountOverview {
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub account_equity: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal", rename = "unrealisedPNL")]
    pub unrealised_pnl: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub margin_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available_balance: Decimal,
}

/// Position from REST or `position.change`; partial pushes omit `currentQty`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinPosition {
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "serde_helpers::opt_decimal")]
    pub current_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_entry_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealised_pnl: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub real_leverage: Decimal,
    #[serde(default)]
    pub cross_mode: bool,
}

/// `[time_ms, open, high, low, close, volume_lots, ...]`, oldest first.
pub type KucoinKlineRow = Vec<Value>;

#[derive(Debug, Clone, Deserialize)]
pub struct KucoinInstanceServer {
    pub endpoint: String,
    #[serde(rename = "pingInterval", default)]
    pub ping_interval: u64,
}

/// Connection token for the push service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinBullet {
    pub token: String,
    pub instance_servers: Vec<KucoinInstanceServer>,
}

// WebSocket payloads

#[derive(Debug, Clone, Deserialize)]
pub struct KucoinWsFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub code: String,
    #[serde(default)]
    pub data: Value,
}

/// `orderChange` on `/contractMarket/tradeOrders`; sizes in lots, times in ns.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinWsOrder {
    pub order_id: String,
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub change: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub order_type: String,
    pub side: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub filled_size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub match_price: Decimal,
    #[serde(default)]
    pub client_oid: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub order_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub ts: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KucoinWsBalance {
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available_balance: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub hold_balance: Decimal,
}

/// `candle.stick` data; `candles` is `[time_s, open, close, high, low, volume, turnover]`.
#[derive(Debug, Clone, Deserialize)]
pub struct KucoinWsCandle {
    pub symbol: String,
    pub candles: Vec<Value>,
}
