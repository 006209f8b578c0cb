use crate::core::errors::ExchangeError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// No further fills or state changes will happen.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginType {
    Cross,
    Isolated,
}

/// Canonical order.
///
/// `symbol` is always the generic spelling (`BTCUSDT`) and quantities are in
/// base-asset units regardless of how the exchange counts contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: Decimal,
    pub quantity: Decimal,
    pub executed_quantity: Decimal,
    pub average_price: Decimal,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Enforce `executed <= quantity` and `Filled => executed == quantity`.
    ///
    /// Exchanges occasionally report a zero quantity for fully filled market
    /// orders; the executed size is adopted as the quantity in that case.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.executed_quantity.is_sign_negative() {
            self.executed_quantity = Decimal::ZERO;
        }
        if self.quantity.is_zero() && !self.executed_quantity.is_zero() {
            self.quantity = self.executed_quantity;
        }
        if self.executed_quantity > self.quantity {
            self.executed_quantity = self.quantity;
        }
        if self.status == OrderStatus::Filled {
            self.executed_quantity = self.quantity;
        }
        if self.updated_at == 0 {
            self.updated_at = self.created_at;
        }
        self
    }
}

/// Order placement request for the adapter's own symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Base-asset quantity.
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub client_order_id: Option<String>,
    pub reduce_only: bool,
    pub post_only: bool,
}

impl OrderRequest {
    pub fn limit(side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            client_order_id: None,
            reduce_only: false,
            post_only: false,
        }
    }

    pub fn market(side: OrderSide, quantity: Decimal) -> Self {
        Self {
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            client_order_id: None,
            reduce_only: false,
            post_only: false,
        }
    }

    #[must_use]
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    #[must_use]
    pub const fn post_only(mut self, post_only: bool) -> Self {
        self.post_only = post_only;
        self
    }

    /// Reject requests no exchange would accept.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ExchangeError::InvalidParameters(format!(
                "order quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.order_type == OrderType::Limit {
            match self.price {
                Some(price) if price > Decimal::ZERO => {}
                _ => {
                    return Err(ExchangeError::InvalidParameters(
                        "limit orders require a positive price".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Positive for long, negative for short, in base-asset units.
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: Decimal,
    pub margin_type: MarginType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub total_wallet_balance: Decimal,
    pub total_margin_balance: Decimal,
    pub available_balance: Decimal,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub total: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: KlineInterval,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Bucket open time, epoch milliseconds.
    pub timestamp: i64,
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub symbol: String,
    pub rate: Decimal,
    pub next_funding_time: i64,
    pub mark_price: Option<Decimal>,
}

/// Trading metadata of one symbol, cached for the adapter lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub price_decimals: u32,
    pub quantity_decimals: u32,
    pub base_asset: String,
    pub quote_asset: String,
    /// Base-asset amount of one contract, for exchanges that trade contracts.
    /// `None` when the exchange trades base units directly or metadata failed.
    pub contract_size: Option<Decimal>,
    /// Order size step in contracts (OKX `lotSz`); `None` means whole contracts.
    #[serde(default)]
    pub lot_size: Option<Decimal>,
}

impl SymbolInfo {
    pub const DEFAULT_PRICE_DECIMALS: u32 = 2;
    pub const DEFAULT_QUANTITY_DECIMALS: u32 = 4;

    /// Defaults used when the metadata fetch fails at construction.
    pub fn fallback(base_asset: impl Into<String>, quote_asset: impl Into<String>) -> Self {
        Self {
            price_decimals: Self::DEFAULT_PRICE_DECIMALS,
            quantity_decimals: Self::DEFAULT_QUANTITY_DECIMALS,
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
            contract_size: None,
            lot_size: None,
        }
    }

    /// Round a price to the symbol's tick precision.
    pub fn format_price(&self, price: Decimal) -> String {
        price
            .round_dp_with_strategy(self.price_decimals, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string()
    }

    /// Truncate a quantity to the symbol's step precision; never rounds up.
    pub fn format_quantity(&self, quantity: Decimal) -> String {
        quantity
            .round_dp_with_strategy(self.quantity_decimals, RoundingStrategy::ToZero)
            .normalize()
            .to_string()
    }

    /// Base quantity -> contracts, truncated to a multiple of the lot step.
    pub fn to_contracts(&self, quantity: Decimal) -> Result<Decimal, ExchangeError> {
        let size = self.contract_size.filter(|c| !c.is_zero()).ok_or_else(|| {
            ExchangeError::InvalidParameters(format!(
                "contract size unavailable for {}{}: symbol metadata failed to load",
                self.base_asset, self.quote_asset
            ))
        })?;
        let lot = self
            .lot_size
            .filter(|lot| *lot > Decimal::ZERO)
            .unwrap_or(Decimal::ONE);
        let contracts = ((quantity / size) / lot).trunc() * lot;
        if contracts.is_zero() {
            return Err(ExchangeError::InvalidParameters(format!(
                "quantity {} is below one lot ({} contracts of {})",
                quantity, lot, size
            )));
        }
        Ok(contracts.normalize())
    }

    /// Contracts -> base quantity; a missing contract size counts as 1.
    pub fn from_contracts(&self, contracts: Decimal) -> Decimal {
        (contracts * self.contract_size.unwrap_or(Decimal::ONE)).normalize()
    }
}

/// Update delivered by an order/account stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Order(Order),
    Positions(Vec<Position>),
    Balance(Balance),
}

/// Outcome of `batch_place_orders`.
#[derive(Debug, Default)]
pub struct BatchPlaceResult {
    pub placed: Vec<Order>,
    /// Index into the request slice and the error for that item.
    pub failed: Vec<(usize, ExchangeError)>,
    /// At least one item was rejected for insufficient margin.
    pub margin_insufficient: bool,
}

impl BatchPlaceResult {
    pub fn record(&mut self, index: usize, result: Result<Order, ExchangeError>) {
        match result {
            Ok(order) => self.placed.push(order),
            Err(e) => {
                if e.is_insufficient_margin() {
                    self.margin_insufficient = true;
                }
                self.failed.push((index, e));
            }
        }
    }
}

/// Outcome of `batch_cancel_orders`.
#[derive(Debug, Default)]
pub struct BatchCancelResult {
    pub canceled: Vec<String>,
    /// Orders the exchange no longer knows (already canceled or filled).
    pub already_resolved: Vec<String>,
    pub failed: Vec<(String, ExchangeError)>,
}

impl BatchCancelResult {
    pub fn record(&mut self, order_id: String, result: Result<(), ExchangeError>) {
        match result {
            Ok(()) => self.canceled.push(order_id),
            Err(e) if e.is_order_not_found() => self.already_resolved.push(order_id),
            Err(e) => self.failed.push((order_id, e)),
        }
    }

    pub fn attempted(&self) -> usize {
        self.canceled.len() + self.already_resolved.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    Minutes1,
    Minutes3,
    Minutes5,
    Minutes15,
    Minutes30,
    Hours1,
    Hours2,
    Hours4,
    Hours6,
    Hours8,
    Hours12,
    Days1,
    Weeks1,
    Months1,
}

impl KlineInterval {
    pub const DEFAULT: Self = Self::Minutes1;

    pub const ALL: [Self; 14] = [
        Self::Minutes1,
        Self::Minutes3,
        Self::Minutes5,
        Self::Minutes15,
        Self::Minutes30,
        Self::Hours1,
        Self::Hours2,
        Self::Hours4,
        Self::Hours6,
        Self::Hours8,
        Self::Hours12,
        Self::Days1,
        Self::Weeks1,
        Self::Months1,
    ];

    /// Generic spelling, e.g. "1m", "4h", "1d".
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minutes1 => "1m",
            Self::Minutes3 => "3m",
            Self::Minutes5 => "5m",
            Self::Minutes15 => "15m",
            Self::Minutes30 => "30m",
            Self::Hours1 => "1h",
            Self::Hours2 => "2h",
            Self::Hours4 => "4h",
            Self::Hours6 => "6h",
            Self::Hours8 => "8h",
            Self::Hours12 => "12h",
            Self::Days1 => "1d",
            Self::Weeks1 => "1w",
            Self::Months1 => "1M",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        // "1M" is a month; everything else is case-insensitive
        if trimmed == "1M" {
            return Some(Self::Months1);
        }
        let interval = match trimmed.to_ascii_lowercase().as_str() {
            "1m" | "1min" => Self::Minutes1,
            "3m" | "3min" => Self::Minutes3,
            "5m" | "5min" => Self::Minutes5,
            "15m" | "15min" => Self::Minutes15,
            "30m" | "30min" => Self::Minutes30,
            "1h" | "60m" => Self::Hours1,
            "2h" => Self::Hours2,
            "4h" => Self::Hours4,
            "6h" => Self::Hours6,
            "8h" => Self::Hours8,
            "12h" => Self::Hours12,
            "1d" | "24h" => Self::Days1,
            "1w" | "7d" => Self::Weeks1,
            _ => return None,
        };
        Some(interval)
    }

    /// Parse, falling back to one minute for anything unrecognized.
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            tracing::warn!(interval = %s, fallback = Self::DEFAULT.as_str(), "Unrecognized kline interval");
            Self::DEFAULT
        })
    }

    pub const fn minutes(self) -> i64 {
        match self {
            Self::Minutes1 => 1,
            Self::Minutes3 => 3,
            Self::Minutes5 => 5,
            Self::Minutes15 => 15,
            Self::Minutes30 => 30,
            Self::Hours1 => 60,
            Self::Hours2 => 120,
            Self::Hours4 => 240,
            Self::Hours6 => 360,
            Self::Hours8 => 480,
            Self::Hours12 => 720,
            Self::Days1 => 1440,
            Self::Weeks1 => 10080,
            Self::Months1 => 43200,
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient field decoders for exchange payloads.
///
/// Exchanges mix strings, numbers, empty strings and nulls for the same
/// numeric field. A malformed value decodes to zero/empty instead of failing
/// the whole message.
pub mod serde_helpers {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value_to_decimal(&Value::deserialize(deserializer)?))
    }

    pub fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match &value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            other => Some(value_to_decimal(other)),
        })
    }

    pub fn i64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value_to_i64(&Value::deserialize(deserializer)?))
    }

    /// Order ids arrive as numbers on some exchanges and strings on others.
    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    pub fn bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
            _ => false,
        })
    }

    pub fn value_to_decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => parse_decimal(s),
            Value::Number(n) => parse_decimal(&n.to_string()),
            _ => Decimal::ZERO,
        }
    }

    pub fn value_to_i64(value: &Value) -> i64 {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or_default(),
            Value::String(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or_default(),
            _ => 0,
        }
    }

    fn parse_decimal(s: &str) -> Decimal {
        let s = s.trim();
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .unwrap_or(Decimal::ZERO)
    }
}

pub mod conversion {
    use super::{Decimal, FromStr};

    /// Convert string to Decimal with fallback
    #[inline]
    pub fn string_to_decimal(s: &str) -> Decimal {
        Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO)
    }

    /// Number of decimals implied by a tick/step size ("0.010" -> 2, "1" -> 0).
    pub fn decimals_from_step(step: Decimal) -> u32 {
        if step <= Decimal::ZERO {
            return 0;
        }
        step.normalize().scale()
    }

    pub fn decimals_from_step_str(step: &str) -> Option<u32> {
        let step = Decimal::from_str(step.trim()).ok()?;
        (step > Decimal::ZERO).then(|| decimals_from_step(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(quantity: Decimal, executed: Decimal, status: OrderStatus) -> Order {
        Order {
            order_id: "1".to_string(),
            client_order_id: String::new(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            price: d("100"),
            quantity,
            executed_quantity: executed,
            average_price: Decimal::ZERO,
            status,
            created_at: 10,
            updated_at: 0,
        }
    }

    #[test]
    fn test_order_invariant_clamps_overfill() {
        let o = order(d("1"), d("1.5"), OrderStatus::PartiallyFilled).normalized();
        assert_eq!(o.executed_quantity, d("1"));
        assert_eq!(o.updated_at, 10);
    }

    #[test]
    fn test_filled_order_reports_full_execution() {
        let o = order(d("2"), d("1.2"), OrderStatus::Filled).normalized();
        assert_eq!(o.executed_quantity, o.quantity);

        let market = order(Decimal::ZERO, d("0.3"), OrderStatus::Filled).normalized();
        assert_eq!(market.quantity, d("0.3"));
        assert_eq!(market.executed_quantity, d("0.3"));
    }

    #[test]
    fn test_order_invariant_holds_over_grid() {
        let quantities = [d("0"), d("0.5"), d("1"), d("3")];
        let statuses = [
            OrderStatus::New,
            OrderStatus::PartiallyFilled,
            OrderStatus::Filled,
            OrderStatus::Canceled,
        ];
        for q in quantities {
            for e in [d("-1"), d("0"), d("0.25"), d("2"), d("5")] {
                for s in statuses {
                    let o = order(q, e, s).normalized();
                    assert!(o.executed_quantity <= o.quantity, "{:?}", o);
                    if o.status == OrderStatus::Filled {
                        assert_eq!(o.executed_quantity, o.quantity);
                    }
                }
            }
        }
    }

    #[test]
    fn test_symbol_info_formatting() {
        let info = SymbolInfo {
            price_decimals: 1,
            quantity_decimals: 3,
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            contract_size: Some(d("0.001")),
            lot_size: None,
        };
        assert_eq!(info.format_price(d("27123.456")), "27123.5");
        assert_eq!(info.format_quantity(d("0.12399")), "0.123");
        assert_eq!(info.to_contracts(d("0.0159")).unwrap(), d("15"));
        assert_eq!(info.from_contracts(d("15")), d("0.015"));
    }

    #[test]
    fn test_fractional_lots_keep_the_full_quantity() {
        let info = SymbolInfo {
            price_decimals: 1,
            quantity_decimals: 4,
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            contract_size: Some(d("0.01")),
            lot_size: Some(d("0.01")),
        };
        assert_eq!(info.to_contracts(d("0.015")).unwrap(), d("1.5"));
        assert_eq!(info.from_contracts(d("1.5")), d("0.015"));
        assert_eq!(info.to_contracts(d("0.005")).unwrap(), d("0.5"));
        // Below one lot: 0.00001 BTC is 0.001 contracts
        assert!(info.to_contracts(d("0.00001")).is_err());
        // Truncation stays on the lot grid
        assert_eq!(info.to_contracts(d("0.01239")).unwrap(), d("1.23"));
    }

    #[test]
    fn test_contracts_require_metadata() {
        let info = SymbolInfo::fallback("BTC", "USDT");
        assert_eq!(info.price_decimals, 2);
        assert_eq!(info.quantity_decimals, 4);
        assert!(info.to_contracts(d("1")).is_err());
        assert_eq!(info.from_contracts(d("3")), d("3"));
    }

    #[test]
    fn test_interval_parsing_and_fallback() {
        assert_eq!(KlineInterval::parse("1h"), Some(KlineInterval::Hours1));
        assert_eq!(KlineInterval::parse("1M"), Some(KlineInterval::Months1));
        assert_eq!(KlineInterval::parse("1m"), Some(KlineInterval::Minutes1));
        assert_eq!(KlineInterval::parse_or_default("7x"), KlineInterval::Minutes1);
        for interval in KlineInterval::ALL {
            assert_eq!(KlineInterval::parse(interval.as_str()), Some(interval));
        }
    }

    #[test]
    fn test_lenient_decimal_fields() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "serde_helpers::decimal")]
            a: Decimal,
            #[serde(default, deserialize_with = "serde_helpers::decimal")]
            b: Decimal,
            #[serde(default, deserialize_with = "serde_helpers::decimal")]
            c: Decimal,
            #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
            id: String,
        }
        let row: Row =
            serde_json::from_str(r#"{"a":"1.25","b":"","c":0.5,"id":123456789012}"#).unwrap();
        assert_eq!(row.a, d("1.25"));
        assert_eq!(row.b, Decimal::ZERO);
        assert_eq!(row.c, d("0.5"));
        assert_eq!(row.id, "123456789012");
    }

    #[test]
    fn test_decimals_from_step() {
        assert_eq!(conversion::decimals_from_step(d("0.010")), 2);
        assert_eq!(conversion::decimals_from_step(d("1")), 0);
        assert_eq!(conversion::decimals_from_step_str("0.00001000"), Some(5));
        assert_eq!(conversion::decimals_from_step_str("abc"), None);
    }

    #[test]
    fn test_batch_cancel_result_classifies() {
        use crate::core::errors::ApiErrorKind;
        let mut result = BatchCancelResult::default();
        result.record("1".to_string(), Ok(()));
        result.record(
            "2".to_string(),
            Err(ExchangeError::api("-2011", "Unknown order sent.", ApiErrorKind::OrderNotFound)),
        );
        result.record("3".to_string(), Err(ExchangeError::NetworkError("timeout".to_string())));
        assert_eq!(result.canceled, vec!["1"]);
        assert_eq!(result.already_resolved, vec!["2"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.attempted(), 3);
    }
}
