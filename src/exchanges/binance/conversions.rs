use crate::core::normalize::map_status;
use crate::core::symbols::{ConcatenatedSymbols, Instrument};
use crate::core::types::conversion::decimals_from_step_str;
use crate::core::types::serde_helpers::{value_to_decimal, value_to_i64};
use crate::core::types::{
    Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::binance::types::{
    BinanceKlineRow, BinanceOrder, BinancePositionRisk, BinanceSymbol, BinanceWsOrder,
    BinanceWsPosition,
};
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "binance";

/// Binance futures symbols are the generic spelling.
pub const SYMBOLS: ConcatenatedSymbols = ConcatenatedSymbols;

pub const STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("NEW", OrderStatus::New),
    ("PARTIALLY_FILLED", OrderStatus::PartiallyFilled),
    ("FILLED", OrderStatus::Filled),
    ("CANCELED", OrderStatus::Canceled),
    ("REJECTED", OrderStatus::Rejected),
    ("EXPIRED", OrderStatus::Expired),
    ("EXPIRED_IN_MATCH", OrderStatus::Expired),
];

pub fn convert_status(raw: &str) -> OrderStatus {
    map_status(EXCHANGE, STATUS_TABLE, raw)
}

pub fn convert_side(raw: &str) -> OrderSide {
    if raw.eq_ignore_ascii_case("SELL") {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    }
}

pub const fn side_to_binance(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "BUY",
        OrderSide::Sell => "SELL",
    }
}

pub fn convert_order_type(raw: &str) -> OrderType {
    if raw.eq_ignore_ascii_case("MARKET") {
        OrderType::Market
    } else {
        OrderType::Limit
    }
}

/// Binance offers every generic interval under the same name.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    Some(interval.as_str())
}

pub fn convert_order(order: &BinanceOrder, instrument: &Instrument) -> Order {
    Order {
        order_id: order.order_id.clone(),
        client_order_id: order.client_order_id.clone(),
        symbol: instrument.symbol.clone(),
        side: convert_side(&order.side),
        order_type: convert_order_type(&order.order_type),
        price: order.price,
        quantity: order.orig_qty,
        executed_quantity: order.executed_qty,
        average_price: order.avg_price,
        status: convert_status(&order.status),
        created_at: if order.time > 0 {
            order.time
        } else {
            order.update_time
        },
        updated_at: order.update_time,
    }
    .normalized()
}

pub fn convert_ws_order(order: &BinanceWsOrder, instrument: &Instrument, event_time: i64) -> Order {
    Order {
        order_id: order.order_id.clone(),
        client_order_id: order.client_order_id.clone(),
        symbol: instrument.symbol.clone(),
        side: convert_side(&order.side),
        order_type: convert_order_type(&order.order_type),
        price: order.price,
        quantity: order.quantity,
        executed_quantity: order.filled,
        average_price: order.average_price,
        status: convert_status(&order.status),
        created_at: order.trade_time,
        updated_at: event_time.max(order.trade_time),
    }
    .normalized()
}

fn margin_type(raw: &str) -> MarginType {
    if raw.eq_ignore_ascii_case("isolated") {
        MarginType::Isolated
    } else {
        MarginType::Cross
    }
}

pub fn convert_position(position: &BinancePositionRisk, instrument: &Instrument) -> Position {
    Position {
        symbol: instrument.symbol.clone(),
        size: position.position_amt,
        entry_price: position.entry_price,
        mark_price: position.mark_price,
        unrealized_pnl: position.unrealized_profit,
        leverage: position.leverage,
        margin_type: margin_type(&position.margin_type),
    }
}

pub fn convert_ws_position(position: &BinanceWsPosition, instrument: &Instrument) -> Position {
    Position {
        symbol: instrument.symbol.clone(),
        size: position.amount,
        entry_price: position.entry_price,
        mark_price: Decimal::ZERO,
        unrealized_pnl: position.unrealized_pnl,
        leverage: Decimal::ZERO,
        margin_type: margin_type(&position.margin_type),
    }
}

fn filter_decimals(symbol: &BinanceSymbol, filter_type: &str) -> Option<u32> {
    let filter = symbol.filters.iter().find(|f| f.filter_type == filter_type)?;
    let step = if filter_type == "PRICE_FILTER" {
        filter.tick_size.as_deref()
    } else {
        filter.step_size.as_deref()
    }?;
    decimals_from_step_str(step)
}

pub fn convert_symbol_info(symbol: &BinanceSymbol) -> SymbolInfo {
    SymbolInfo {
        price_decimals: filter_decimals(symbol, "PRICE_FILTER").unwrap_or(symbol.price_precision),
        quantity_decimals: filter_decimals(symbol, "LOT_SIZE").unwrap_or(symbol.quantity_precision),
        base_asset: symbol.base_asset.clone(),
        quote_asset: symbol.quote_asset.clone(),
        contract_size: None,
        lot_size: None,
    }
}

/// REST kline row; the bucket is closed once its close time has passed.
pub fn convert_kline_row(
    row: &BinanceKlineRow,
    symbol: &str,
    interval: KlineInterval,
    now_ms: i64,
) -> Option<Candle> {
    if row.len() < 7 {
        return None;
    }
    Some(Candle {
        symbol: symbol.to_string(),
        interval,
        open: value_to_decimal(&row[1]),
        high: value_to_decimal(&row[2]),
        low: value_to_decimal(&row[3]),
        close: value_to_decimal(&row[4]),
        volume: value_to_decimal(&row[5]),
        timestamp: value_to_i64(&row[0]),
        is_closed: value_to_i64(&row[6]) < now_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolMapper;
    use serde_json::json;

    fn instrument() -> Instrument {
        Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap()
    }

    #[test]
    fn test_symbol_round_trip() {
        for symbol in ["BTCUSDT", "ETHUSDT", "1000PEPEUSDT"] {
            let native = SYMBOLS.to_native(symbol).unwrap();
            assert_eq!(native, symbol);
            assert_eq!(SYMBOLS.to_generic(&native), symbol);
        }
    }

    #[test]
    fn test_status_table_is_total() {
        for (raw, status) in STATUS_TABLE {
            assert_eq!(convert_status(raw), *status);
        }
        assert_eq!(convert_status("NEW_INSURANCE"), OrderStatus::New);
    }

    #[test]
    fn test_every_interval_is_supported() {
        for interval in KlineInterval::ALL {
            assert_eq!(interval_code(interval), Some(interval.as_str()));
        }
    }

    #[test]
    fn test_filled_order_reports_full_execution() {
        let order: BinanceOrder = serde_json::from_value(json!({
            "orderId": 8_389_765_519_i64,
            "clientOrderId": "abc",
            "symbol": "BTCUSDT",
            "side": "SELL",
            "type": "MARKET",
            "price": "0",
            "origQty": "0.010",
            "executedQty": "0.009",
            "avgPrice": "64000.5",
            "status": "FILLED",
            "updateTime": 1_700_000_000_000_i64
        }))
        .unwrap();

        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.order_id, "8389765519");
        assert_eq!(converted.side, OrderSide::Sell);
        assert_eq!(converted.order_type, OrderType::Market);
        assert_eq!(converted.status, OrderStatus::Filled);
        assert_eq!(converted.executed_quantity, converted.quantity);
        assert_eq!(converted.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_symbol_info_prefers_filters() {
        let symbol: BinanceSymbol = serde_json::from_value(json!({
            "symbol": "BTCUSDT",
            "baseAsset": "BTC",
            "quoteAsset": "USDT",
            "pricePrecision": 2,
            "quantityPrecision": 3,
            "filters": [
                {"filterType": "PRICE_FILTER", "tickSize": "0.10"},
                {"filterType": "LOT_SIZE", "stepSize": "0.001"}
            ]
        }))
        .unwrap();
        let info = convert_symbol_info(&symbol);
        assert_eq!(info.price_decimals, 1);
        assert_eq!(info.quantity_decimals, 3);
        assert_eq!(info.contract_size, None);
    }

    #[test]
    fn test_kline_row_closed_flag() {
        let row = vec![
            json!(1_700_000_000_000_i64),
            json!("1"),
            json!("2"),
            json!("0.5"),
            json!("1.5"),
            json!("100"),
            json!(1_700_000_059_999_i64),
        ];
        let closed = convert_kline_row(&row, "BTCUSDT", KlineInterval::Minutes1, 1_700_000_060_000).unwrap();
        assert!(closed.is_closed);
        let open = convert_kline_row(&row, "BTCUSDT", KlineInterval::Minutes1, 1_700_000_030_000).unwrap();
        assert!(!open.is_closed);
        assert!(convert_kline_row(&row[..3].to_vec(), "BTCUSDT", KlineInterval::Minutes1, 0).is_none());
    }
}
