use crate::core::normalize::map_status;
use crate::core::symbols::{Instrument, SeparatedSymbols};
use crate::core::types::conversion::decimals_from_step_str;
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::gate::types::{GateAccount, GateCandle, GateContract, GateOrder, GatePosition};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "gate";

pub const SETTLE: &str = "usdt";

pub const SYMBOLS: SeparatedSymbols = SeparatedSymbols {
    separator: "_",
    suffix: "",
};

/// Terminal states by `finish_as`; live orders are derived from `left`.
pub const FINISH_TABLE: &[(&str, OrderStatus)] = &[
    ("filled", OrderStatus::Filled),
    ("cancelled", OrderStatus::Canceled),
    ("ioc", OrderStatus::Canceled),
    ("reduce_only", OrderStatus::Canceled),
    ("position_closed", OrderStatus::Canceled),
    ("stp", OrderStatus::Canceled),
    ("liquidated", OrderStatus::Filled),
    ("auto_deleveraged", OrderStatus::Filled),
];

pub fn convert_status(order: &GateOrder) -> OrderStatus {
    if order.status == "open" {
        return if order.left.abs() < order.size.abs() {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::New
        };
    }
    map_status(EXCHANGE, FINISH_TABLE, &order.finish_as)
}

/// Gate encodes the side in the sign of `size`.
pub fn signed_size(side: OrderSide, contracts: Decimal) -> Decimal {
    match side {
        OrderSide::Buy => contracts,
        OrderSide::Sell => -contracts,
    }
}

/// Gate has no 3m, 2h, 6h or 12h candles.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    match interval {
        KlineInterval::Minutes1 => Some("1m"),
        KlineInterval::Minutes5 => Some("5m"),
        KlineInterval::Minutes15 => Some("15m"),
        KlineInterval::Minutes30 => Some("30m"),
        KlineInterval::Hours1 => Some("1h"),
        KlineInterval::Hours4 => Some("4h"),
        KlineInterval::Hours8 => Some("8h"),
        KlineInterval::Days1 => Some("1d"),
        KlineInterval::Weeks1 => Some("7d"),
        KlineInterval::Months1 => Some("30d"),
        KlineInterval::Minutes3
        | KlineInterval::Hours2
        | KlineInterval::Hours6
        | KlineInterval::Hours12 => None,
    }
}

fn secs_to_millis(secs: Decimal) -> i64 {
    (secs * Decimal::from(1000)).trunc().to_i64().unwrap_or_default()
}

pub fn convert_order(order: &GateOrder, instrument: &Instrument) -> Order {
    let info = &instrument.info;
    let total = order.size.abs();
    let filled = total - order.left.abs();
    let created_at = secs_to_millis(order.create_time);
    let finished_at = secs_to_millis(order.finish_time);
    Order {
        order_id: order.id.clone(),
        client_order_id: order.text.clone(),
        symbol: instrument.symbol.clone(),
        side: if order.size.is_sign_negative() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        },
        // Market orders are IOC at price 0
        order_type: if order.price.is_zero() {
            OrderType::Market
        } else {
            OrderType::Limit
        },
        price: order.price,
        quantity: info.from_contracts(total),
        executed_quantity: info.from_contracts(filled),
        average_price: order.fill_price,
        status: convert_status(order),
        created_at,
        updated_at: if finished_at > 0 { finished_at } else { created_at },
    }
    .normalized()
}

pub fn convert_position(position: &GatePosition, instrument: &Instrument) -> Position {
    let cross = position.leverage.is_zero();
    Position {
        symbol: instrument.symbol.clone(),
        size: instrument.info.from_contracts(position.size),
        entry_price: position.entry_price,
        mark_price: position.mark_price,
        unrealized_pnl: position.unrealised_pnl,
        leverage: if cross {
            position.cross_leverage_limit
        } else {
            position.leverage
        },
        margin_type: if cross {
            MarginType::Cross
        } else {
            MarginType::Isolated
        },
    }
}

pub fn convert_balance(account: &GateAccount) -> Balance {
    Balance {
        asset: account.currency.to_ascii_uppercase(),
        total: account.total,
        available: account.available,
    }
}

pub fn convert_symbol_info(contract: &GateContract) -> SymbolInfo {
    let (base, quote) = contract.name.split_once('_').unwrap_or((&contract.name, "USDT"));
    let multiplier = contract.quanto_multiplier;
    SymbolInfo {
        price_decimals: decimals_from_step_str(&contract.order_price_round)
            .unwrap_or(SymbolInfo::DEFAULT_PRICE_DECIMALS),
        // One contract is the smallest step
        quantity_decimals: multiplier.normalize().scale(),
        base_asset: base.to_string(),
        quote_asset: quote.to_string(),
        contract_size: (multiplier > Decimal::ZERO).then_some(multiplier),
        lot_size: None,
    }
}

/// `is_closed` comes from the stream's `w` flag; REST rows leave it to the caller.
pub fn convert_candle(candle: &GateCandle, symbol: &str, interval: KlineInterval, info: &SymbolInfo) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        interval,
        open: candle.o,
        high: candle.h,
        low: candle.l,
        close: candle.c,
        volume: info.from_contracts(candle.v),
        timestamp: candle.t * 1000,
        is_closed: candle.w.unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolMapper;
    use serde_json::json;

    fn instrument() -> Instrument {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.0001".parse().unwrap());
        instrument
    }

    #[test]
    fn test_symbol_round_trip() {
        assert_eq!(SYMBOLS.to_native("BTCUSDT").unwrap(), "BTC_USDT");
        assert_eq!(SYMBOLS.to_generic("ETH_USDT"), "ETHUSDT");
    }

    #[test]
    fn test_sell_order_from_signed_contracts() {
        let order: GateOrder = serde_json::from_value(json!({
            "id": 15675394, "contract": "BTC_USDT", "text": "t-abc", "size": -100, "left": -40,
            "price": "31503.3", "fill_price": "31503.3", "status": "open", "finish_as": "",
            "tif": "gtc", "create_time": 1546569968.123, "finish_time": 0
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.order_id, "15675394");
        assert_eq!(converted.side, OrderSide::Sell);
        assert_eq!(converted.quantity, "0.01".parse::<Decimal>().unwrap());
        assert_eq!(converted.executed_quantity, "0.006".parse::<Decimal>().unwrap());
        assert_eq!(converted.status, OrderStatus::PartiallyFilled);
        assert_eq!(converted.created_at, 1_546_569_968_123);
        assert_eq!(converted.updated_at, converted.created_at);
    }

    #[test]
    fn test_finished_orders_use_finish_as() {
        let order: GateOrder = serde_json::from_value(json!({
            "id": "1", "contract": "BTC_USDT", "size": 10, "left": 0, "price": "0",
            "status": "finished", "finish_as": "filled", "tif": "ioc", "create_time": 1, "finish_time": 2
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.status, OrderStatus::Filled);
        assert_eq!(converted.order_type, OrderType::Market);
        for (raw, status) in FINISH_TABLE {
            let mut finished = order.clone();
            finished.finish_as = raw.to_string();
            assert_eq!(convert_status(&finished), *status);
        }
    }

    #[test]
    fn test_cross_position_leverage() {
        let position: GatePosition = serde_json::from_value(json!({
            "contract": "BTC_USDT", "size": -20, "entry_price": "30000", "mark_price": "30100",
            "unrealised_pnl": "-0.2", "leverage": "0", "cross_leverage_limit": "25"
        }))
        .unwrap();
        let converted = convert_position(&position, &instrument());
        assert_eq!(converted.size, "-0.002".parse::<Decimal>().unwrap());
        assert_eq!(converted.leverage, Decimal::from(25));
        assert_eq!(converted.margin_type, MarginType::Cross);
    }

    #[test]
    fn test_symbol_info_uses_multiplier() {
        let contract: GateContract = serde_json::from_value(json!({
            "name": "ETH_USDT", "quanto_multiplier": "0.01", "order_price_round": "0.05"
        }))
        .unwrap();
        let info = convert_symbol_info(&contract);
        assert_eq!(info.price_decimals, 2);
        assert_eq!(info.quantity_decimals, 2);
        assert_eq!(info.base_asset, "ETH");
        assert_eq!(info.contract_size, Some("0.01".parse().unwrap()));
    }

    #[test]
    fn test_unsupported_intervals() {
        assert_eq!(interval_code(KlineInterval::Hours2), None);
        assert_eq!(interval_code(KlineInterval::Weeks1), Some("7d"));
    }
}
