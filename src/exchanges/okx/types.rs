use crate::core::types::serde_helpers;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// OKX API standard response wrapper; `data` is decoded per endpoint.
#[derive(Debug, Deserialize)]
pub struct OkxResponse {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

/// SWAP instrument metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxInstrument {
    pub inst_id: String,
    /// Contract value in `ct_val_ccy` (the base asset for linear swaps).
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub ct_val: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub ct_mult: Decimal,
    pub tick_sz: String,
    pub lot_sz: String,
    #[serde(default)]
    pub ct_val_ccy: String,
    #[serde(default)]
    pub settle_ccy: String,
}

/// Per-order acknowledgement of place/cancel calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxOrderAck {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

impl OkxOrderAck {
    pub fn is_success(&self) -> bool {
        self.s_code.is_empty() || self.s_code == "0"
    }
}

/// Order details, shared by REST queries and the `orders` channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxOrder {
    pub inst_id: String,
    pub ord_id: String,
    #[serde(default)]
    pub cl_ord_id: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub px: Decimal,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub sz: Decimal,
    pub ord_type: String,
    pub side: String,
    pub state: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub acc_fill_sz: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_px: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub c_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub u_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxBalanceDetail {
    pub ccy: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub eq: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub cash_bal: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avail_eq: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avail_bal: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxAccountBalance {
    /// Total equity in USD.
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub total_eq: Decimal,
    /// Adjusted (margin) equity, multi-currency margin modes only.
    #[serde(default, deserialize_with = "serde_helpers::opt_decimal")]
    pub adj_eq: Option<Decimal>,
    #[serde(default)]
    pub details: Vec<OkxBalanceDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxPosition {
    pub inst_id: String,
    /// Contracts; signed in net mode, always positive in long/short mode.
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub pos: Decimal,
    /// `net`, `long` or `short`.
    #[serde(default)]
    pub pos_side: String,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub avg_px: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub mark_px: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub upl: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::decimal")]
    pub lever: Decimal,
    #[serde(default)]
    pub mgn_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxFundingRate {
    pub inst_id: String,
    #[serde(deserialize_with = "serde_helpers::decimal")]
    pub funding_rate: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub next_funding_time: i64,
    #[serde(default, deserialize_with = "serde_helpers::i64_lenient")]
    pub funding_time: i64,
}

/// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`, strings throughout.
pub type OkxCandleRow = Vec<Value>;

// WebSocket payloads

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxWsArg {
    pub channel: String,
    #[serde(default)]
    pub inst_id: Option<String>,
}

/// Data push: `{"arg": {...}, "data": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OkxWsPush {
    pub arg: OkxWsArg,
    #[serde(default)]
    pub data: Vec<Value>,
}

/// Control event: login, subscribe, error.
#[derive(Debug, Clone, Deserialize)]
pub struct OkxWsEvent {
    pub event: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxWsAccount {
    #[serde(default)]
    pub details: Vec<OkxBalanceDetail>,
}
