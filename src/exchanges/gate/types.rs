use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Error body of a non-2xx answer.
#[derive(Debug, Deserialize)]
pub struct GateErrorBody {
    pub label: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateContract {
    pub name: String,
    /// Base-asset amount of one contract.
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub quanto_multiplier: Decimal,
    #[serde(default)]
    pub order_price_round: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub funding_rate: Decimal,
    /// Seconds.
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub funding_next_apply: i64,
}

/// Futures order; REST and the `futures.orders` channel share the shape.
/// `size` and `left` are signed contract counts (negative for sells).
#[derive(Debug, Clone, Deserialize)]
pub struct GateOrder {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    pub contract: String,
    #[serde(default)]
    pub text: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub left: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub fill_price: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub finish_as: String,
    #[serde(default)]
    pub tif: String,
    /// Seconds with fractional part.
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub create_time: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub finish_time: Decimal,
}

/// Outcome flags of one batch placement item; on success the same object
/// also carries the order fields.
#[derive(Debug, Clone, Deserialize)]
pub struct GateBatchItem {
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateCancelItem {
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateAccount {
    /// User id, needed for private channel payloads.
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub user: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub total: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealised_pnl: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub available: Decimal,
}

/// Position from REST or `futures.positions`; the channel omits mark price and PnL.
#[derive(Debug, Clone, Deserialize)]
pub struct GatePosition {
    pub contract: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub size: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub entry_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_price: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub unrealised_pnl: Decimal,
    /// `0` means cross margin.
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub leverage: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub cross_leverage_limit: Decimal,
}

/// Candle from REST or `futures.candlesticks`; `t` in seconds, `v` in contracts.
#[derive(Debug, Clone, Deserialize)]
pub struct GateCandle {
    #[serde(deserialize_with = "serde_helpers::i64_lenient")]
    pub t: i64,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub v: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub o: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub h: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub l: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub c: Decimal,
    /// `<interval>_<contract>`, stream only.
    #[serde(default)]
    pub n: String,
    /// Window closed, stream only.
    #[serde(default)]
    pub w: Option<bool>,
}

// WebSocket payloads

#[derive(Debug, Clone, Deserialize)]
pub struct GateWsError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateWsFrame {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub error: Option<GateWsError>,
    #[serde(default)]
    pub result: Value,
}

/// `futures.balances` item; `balance` is the wallet total after the change.
#[derive(Debug, Clone, Deserialize)]
pub struct GateWsBalance {
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub balance: Decimal,
    #[serde(default)]
    pub currency: String,
}
