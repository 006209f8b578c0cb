use crate::core::errors::ExchangeError;
use crate::core::normalize::map_status;
use crate::core::symbols::{join_generic, split_generic, Instrument, SymbolMapper};
use crate::core::types::conversion::decimals_from_step;
use crate::core::types::serde_helpers::{value_to_decimal, value_to_i64};
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::kucoin::types::{
    KucoinAccountOverview, KucoinContract, KucoinKlineRow, KucoinOrder, KucoinPosition,
    KucoinWsCandle, KucoinWsOrder,
};
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "kucoin";

/// `BTCUSDT` <-> `XBTUSDTM`: Bitcoin is `XBT` and perpetuals end in `M`.
#[derive(Debug, Clone, Copy)]
pub struct KucoinSymbols;

pub const SYMBOLS: KucoinSymbols = KucoinSymbols;

fn to_kucoin_asset(asset: &str) -> &str {
    if asset.eq_ignore_ascii_case("BTC") {
        "XBT"
    } else {
        asset
    }
}

pub fn from_kucoin_asset(asset: &str) -> String {
    if asset.eq_ignore_ascii_case("XBT") {
        "BTC".to_string()
    } else {
        asset.to_ascii_uppercase()
    }
}

impl SymbolMapper for KucoinSymbols {
    fn to_native(&self, generic: &str) -> Result<String, ExchangeError> {
        let (base, quote) = split_generic(generic)?;
        Ok(format!("{}{}M", to_kucoin_asset(&base), quote))
    }

    fn to_generic(&self, native: &str) -> String {
        let upper = native.to_ascii_uppercase();
        let trimmed = upper.strip_suffix('M').unwrap_or(&upper);
        match split_generic(trimmed) {
            Ok((base, quote)) => join_generic(&from_kucoin_asset(&base), &quote),
            Err(_) => upper,
        }
    }
}

/// Order-change kinds of the private order channel.
pub const CHANGE_TABLE: &[(&str, OrderStatus)] = &[
    ("open", OrderStatus::New),
    ("update", OrderStatus::New),
    ("match", OrderStatus::PartiallyFilled),
    ("filled", OrderStatus::Filled),
    ("canceled", OrderStatus::Canceled),
];

pub const fn side_to_kucoin(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn convert_side(raw: &str) -> OrderSide {
    if raw.eq_ignore_ascii_case("sell") {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    }
}

fn convert_order_type(raw: &str) -> OrderType {
    if raw.eq_ignore_ascii_case("market") {
        OrderType::Market
    } else {
        OrderType::Limit
    }
}

/// REST granularity in minutes; no 3m, 6h or monthly candles.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    match interval {
        KlineInterval::Minutes1 => Some("1"),
        KlineInterval::Minutes5 => Some("5"),
        KlineInterval::Minutes15 => Some("15"),
        KlineInterval::Minutes30 => Some("30"),
        KlineInterval::Hours1 => Some("60"),
        KlineInterval::Hours2 => Some("120"),
        KlineInterval::Hours4 => Some("240"),
        KlineInterval::Hours8 => Some("480"),
        KlineInterval::Hours12 => Some("720"),
        KlineInterval::Days1 => Some("1440"),
        KlineInterval::Weeks1 => Some("10080"),
        KlineInterval::Minutes3 | KlineInterval::Hours6 | KlineInterval::Months1 => None,
    }
}

/// Candle topic suffix for an interval accepted by [`interval_code`].
pub fn topic_code(interval: KlineInterval) -> &'static str {
    match interval {
        KlineInterval::Minutes5 => "5min",
        KlineInterval::Minutes15 => "15min",
        KlineInterval::Minutes30 => "30min",
        KlineInterval::Hours1 => "1hour",
        KlineInterval::Hours2 => "2hour",
        KlineInterval::Hours4 => "4hour",
        KlineInterval::Hours8 => "8hour",
        KlineInterval::Hours12 => "12hour",
        KlineInterval::Days1 => "1day",
        KlineInterval::Weeks1 => "1week",
        _ => "1min",
    }
}

fn rest_status(order: &KucoinOrder) -> OrderStatus {
    if order.is_active {
        if order.filled_size.is_zero() {
            OrderStatus::New
        } else {
            OrderStatus::PartiallyFilled
        }
    } else if order.cancel_exist {
        OrderStatus::Canceled
    } else {
        OrderStatus::Filled
    }
}

pub fn convert_order(order: &KucoinOrder, instrument: &Instrument) -> Order {
    let info = &instrument.info;
    let filled = info.from_contracts(order.filled_size);
    let average_price = if filled.is_zero() {
        Decimal::ZERO
    } else {
        (order.filled_value / filled).round_dp(info.price_decimals)
    };
    Order {
        order_id: order.id.clone(),
        client_order_id: order.client_oid.clone().unwrap_or_default(),
        symbol: instrument.symbol.clone(),
        side: convert_side(&order.side),
        order_type: convert_order_type(&order.order_type),
        price: order.price,
        quantity: info.from_contracts(order.size),
        executed_quantity: filled,
        average_price,
        status: rest_status(order),
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
    .normalized()
}

pub fn convert_ws_order(order: &KucoinWsOrder, instrument: &Instrument) -> Order {
    let info = &instrument.info;
    let mut status = map_status(EXCHANGE, CHANGE_TABLE, &order.change);
    if status == OrderStatus::New && !order.filled_size.is_zero() {
        status = OrderStatus::PartiallyFilled;
    }
    Order {
        order_id: order.order_id.clone(),
        client_order_id: order.client_oid.clone().unwrap_or_default(),
        symbol: instrument.symbol.clone(),
        side: convert_side(&order.side),
        order_type: convert_order_type(&order.order_type),
        price: order.price,
        quantity: info.from_contracts(order.size),
        executed_quantity: info.from_contracts(order.filled_size),
        average_price: order.match_price,
        status,
        created_at: order.order_time / 1_000_000,
        updated_at: order.ts / 1_000_000,
    }
    .normalized()
}

pub fn convert_position(position: &KucoinPosition, instrument: &Instrument) -> Position {
    Position {
        symbol: instrument.symbol.clone(),
        size: instrument
            .info
            .from_contracts(position.current_qty.unwrap_or(Decimal::ZERO)),
        entry_price: position.avg_entry_price,
        mark_price: position.mark_price,
        unrealized_pnl: position.unrealised_pnl,
        leverage: position.real_leverage,
        margin_type: if position.cross_mode {
            MarginType::Cross
        } else {
            MarginType::Isolated
        },
    }
}

pub fn convert_balance(overview: &KucoinAccountOverview) -> Balance {
    Balance {
        asset: overview.currency.to_ascii_uppercase(),
        total: overview.account_equity,
        available: overview.available_balance,
    }
}

pub fn convert_symbol_info(contract: &KucoinContract) -> SymbolInfo {
    SymbolInfo {
        price_decimals: decimals_from_step(contract.tick_size),
        // One lot is the smallest step
        quantity_decimals: decimals_from_step(contract.multiplier),
        base_asset: from_kucoin_asset(&contract.base_currency),
        quote_asset: contract.quote_currency.to_ascii_uppercase(),
        contract_size: (contract.multiplier > Decimal::ZERO).then_some(contract.multiplier),
        lot_size: None,
    }
}

/// REST row; finality is decided by the caller.
pub fn convert_kline_row(row: &KucoinKlineRow, symbol: &str, interval: KlineInterval, info: &SymbolInfo) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    Some(Candle {
        symbol: symbol.to_string(),
        interval,
        open: value_to_decimal(&row[1]),
        high: value_to_decimal(&row[2]),
        low: value_to_decimal(&row[3]),
        close: value_to_decimal(&row[4]),
        volume: info.from_contracts(value_to_decimal(&row[5])),
        timestamp: value_to_i64(&row[0]),
        is_closed: false,
    })
}

/// Stream candle; note the open, close, high, low order.
pub fn convert_ws_candle(candle: &KucoinWsCandle, interval: KlineInterval, info: &SymbolInfo) -> Option<Candle> {
    let c = &candle.candles;
    if c.len() < 6 {
        return None;
    }
    Some(Candle {
        symbol: SYMBOLS.to_generic(&candle.symbol),
        interval,
        open: value_to_decimal(&c[1]),
        close: value_to_decimal(&c[2]),
        high: value_to_decimal(&c[3]),
        low: value_to_decimal(&c[4]),
        volume: info.from_contracts(value_to_decimal(&c[5])),
        timestamp: value_to_i64(&c[0]) * 1000,
        is_closed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instrument() -> Instrument {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.001".parse().unwrap());
        instrument
    }

    #[test]
    fn test_bitcoin_alias() {
        assert_eq!(SYMBOLS.to_native("BTCUSDT").unwrap(), "XBTUSDTM");
        assert_eq!(SYMBOLS.to_native("ETHUSDT").unwrap(), "ETHUSDTM");
        assert_eq!(SYMBOLS.to_generic("XBTUSDTM"), "BTCUSDT");
        assert_eq!(SYMBOLS.to_generic("SOLUSDTM"), "SOLUSDT");
    }

    #[test]
    fn test_canceled_partial_fill() {
        let order: KucoinOrder = serde_json::from_value(json!({
            "id": "5cdfc138b21023a909e5ad55", "symbol": "XBTUSDTM", "clientOid": "c1",
            "type": "limit", "side": "buy", "price": "3600", "size": 20, "filledSize": 10,
            "filledValue": "36", "status": "done", "isActive": false, "cancelExist": true,
            "createdAt": 1558167872000i64, "updatedAt": 1558167900000i64
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.status, OrderStatus::Canceled);
        assert_eq!(converted.quantity, "0.02".parse::<Decimal>().unwrap());
        assert_eq!(converted.executed_quantity, "0.01".parse::<Decimal>().unwrap());
        assert_eq!(converted.average_price, Decimal::from(3600));
    }

    #[test]
    fn test_stream_order_times_are_nanoseconds() {
        let order: KucoinWsOrder = serde_json::from_value(json!({
            "orderId": "1", "symbol": "XBTUSDTM", "type": "match", "status": "match",
            "orderType": "limit", "side": "sell", "price": "3600", "size": "20",
            "filledSize": "5", "matchPrice": "3600", "orderTime": 1545914149935808589i64,
            "ts": 1545914149935808590i64
        }))
        .unwrap();
        let converted = convert_ws_order(&order, &instrument());
        assert_eq!(converted.status, OrderStatus::PartiallyFilled);
        assert_eq!(converted.created_at, 1_545_914_149_935);
        assert_eq!(converted.side, OrderSide::Sell);
    }

    #[test]
    fn test_contract_metadata() {
        let contract: KucoinContract = serde_json::from_value(json!({
            "symbol": "XBTUSDTM", "baseCurrency": "XBT", "quoteCurrency": "USDT",
            "multiplier": 0.001, "tickSize": 0.1
        }))
        .unwrap();
        let info = convert_symbol_info(&contract);
        assert_eq!(info.base_asset, "BTC");
        assert_eq!(info.price_decimals, 1);
        assert_eq!(info.quantity_decimals, 3);
        assert_eq!(info.contract_size, Some("0.001".parse().unwrap()));
    }

    #[test]
    fn test_stream_candle_field_order() {
        let candle: KucoinWsCandle = serde_json::from_value(json!({
            "symbol": "XBTUSDTM",
            "candles": ["1589968800", "9786.9", "9740.8", "9789.9", "9706.1", "1000", "9000000"]
        }))
        .unwrap();
        let converted = convert_ws_candle(&candle, KlineInterval::Minutes1, &instrument().info).unwrap();
        assert_eq!(converted.symbol, "BTCUSDT");
        assert_eq!(converted.close, "9740.8".parse::<Decimal>().unwrap());
        assert_eq!(converted.high, "9789.9".parse::<Decimal>().unwrap());
        assert_eq!(converted.volume, Decimal::ONE);
        assert_eq!(converted.timestamp, 1_589_968_800_000);
    }
}
