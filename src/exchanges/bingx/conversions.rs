use crate::core::normalize::map_status;
use crate::core::symbols::{Instrument, SeparatedSymbols};
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::bingx::types::{
    BingxBalance, BingxContract, BingxKline, BingxOrder, BingxPosition, BingxWsCandle,
    BingxWsOrder, BingxWsPosition,
};
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "bingx";

pub const SYMBOLS: SeparatedSymbols = SeparatedSymbols {
    separator: "-",
    suffix: "",
};

pub const STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("NEW", OrderStatus::New),
    ("PENDING", OrderStatus::New),
    ("PARTIALLY_FILLED", OrderStatus::PartiallyFilled),
    ("FILLED", OrderStatus::Filled),
    ("CANCELED", OrderStatus::Canceled),
    ("CANCELLED", OrderStatus::Canceled),
    ("EXPIRED", OrderStatus::Expired),
    ("FAILED", OrderStatus::Rejected),
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

pub const fn side_to_bingx(side: OrderSide) -> &'static str {
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

/// Every generic interval exists under the same name.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    Some(interval.as_str())
}

pub fn convert_order(order: &BingxOrder, instrument: &Instrument) -> Order {
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
        created_at: order.time,
        updated_at: order.update_time,
    }
    .normalized()
}

pub fn convert_ws_order(order: &BingxWsOrder, instrument: &Instrument, event_time: i64) -> Order {
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

/// Hedge-mode shorts report a positive amount.
fn signed_amount(amount: Decimal, position_side: &str) -> Decimal {
    if position_side.eq_ignore_ascii_case("SHORT") {
        -amount.abs()
    } else {
        amount
    }
}

pub fn convert_position(position: &BingxPosition, instrument: &Instrument) -> Position {
    Position {
        symbol: instrument.symbol.clone(),
        size: signed_amount(position.position_amt, &position.position_side),
        entry_price: position.avg_price,
        mark_price: position.mark_price,
        unrealized_pnl: position.unrealized_profit,
        leverage: position.leverage,
        margin_type: if position.isolated {
            MarginType::Isolated
        } else {
            MarginType::Cross
        },
    }
}

pub fn convert_ws_position(position: &BingxWsPosition, instrument: &Instrument) -> Position {
    Position {
        symbol: instrument.symbol.clone(),
        size: signed_amount(position.amount, &position.position_side),
        entry_price: position.entry_price,
        mark_price: Decimal::ZERO,
        unrealized_pnl: position.unrealized_pnl,
        leverage: Decimal::ZERO,
        margin_type: if position.margin_type.eq_ignore_ascii_case("isolated") {
            MarginType::Isolated
        } else {
            MarginType::Cross
        },
    }
}

pub fn convert_balance(balance: &BingxBalance) -> Balance {
    Balance {
        asset: balance.asset.to_ascii_uppercase(),
        total: balance.balance,
        available: balance.available_margin,
    }
}

pub fn convert_symbol_info(contract: &BingxContract) -> SymbolInfo {
    let (base, quote) = contract
        .symbol
        .split_once('-')
        .unwrap_or((&contract.asset, &contract.currency));
    SymbolInfo {
        price_decimals: u32::try_from(contract.price_precision)
            .unwrap_or(SymbolInfo::DEFAULT_PRICE_DECIMALS),
        quantity_decimals: u32::try_from(contract.quantity_precision)
            .unwrap_or(SymbolInfo::DEFAULT_QUANTITY_DECIMALS),
        base_asset: base.to_ascii_uppercase(),
        quote_asset: quote.to_ascii_uppercase(),
        contract_size: None,
        lot_size: None,
    }
}

/// `is_closed` is left to the caller.
pub fn convert_kline(kline: &BingxKline, symbol: &str, interval: KlineInterval) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        interval,
        open: kline.open,
        high: kline.high,
        low: kline.low,
        close: kline.close,
        volume: kline.volume,
        timestamp: kline.time,
        is_closed: false,
    }
}

pub fn convert_ws_candle(candle: &BingxWsCandle, symbol: &str, interval: KlineInterval) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        interval,
        open: candle.o,
        high: candle.h,
        low: candle.l,
        close: candle.c,
        volume: candle.v,
        timestamp: candle.open_time,
        is_closed: false,
    }
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
        assert_eq!(SYMBOLS.to_native("BTCUSDT").unwrap(), "BTC-USDT");
        assert_eq!(SYMBOLS.to_generic("ETH-USDT"), "ETHUSDT");
    }

    #[test]
    fn test_rest_order_conversion() {
        let order: BingxOrder = serde_json::from_value(json!({
            "orderId": 1735950529123455488_i64, "symbol": "BTC-USDT", "clientOrderID": "abc",
            "side": "SELL", "type": "LIMIT", "price": "42000.5", "origQty": "0.010",
            "executedQty": "0.004", "avgPrice": "42000.5", "status": "PARTIALLY_FILLED",
            "time": 1702731661854_i64, "updateTime": 1702731662000_i64
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.order_id, "1735950529123455488");
        assert_eq!(converted.client_order_id, "abc");
        assert_eq!(converted.side, OrderSide::Sell);
        assert_eq!(converted.status, OrderStatus::PartiallyFilled);
        assert_eq!(converted.executed_quantity, "0.004".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_hedge_short_is_negative() {
        let position: BingxPosition = serde_json::from_value(json!({
            "symbol": "BTC-USDT", "positionSide": "SHORT", "isolated": true,
            "positionAmt": "0.5", "avgPrice": "43000", "markPrice": "42900",
            "unrealizedProfit": "50", "leverage": 5
        }))
        .unwrap();
        let converted = convert_position(&position, &instrument());
        assert_eq!(converted.size, "-0.5".parse::<Decimal>().unwrap());
        assert_eq!(converted.margin_type, MarginType::Isolated);
    }

    #[test]
    fn test_symbol_info_from_precisions() {
        let contract: BingxContract = serde_json::from_value(json!({
            "symbol": "ETH-USDT", "asset": "ETH", "currency": "USDT",
            "pricePrecision": 2, "quantityPrecision": 3
        }))
        .unwrap();
        let info = convert_symbol_info(&contract);
        assert_eq!(info.price_decimals, 2);
        assert_eq!(info.quantity_decimals, 3);
        assert_eq!(info.base_asset, "ETH");
    }
}
