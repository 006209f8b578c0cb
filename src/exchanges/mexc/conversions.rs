use crate::core::normalize::map_status;
use crate::core::symbols::{Instrument, SeparatedSymbols, SymbolMapper};
use crate::core::types::conversion::decimals_from_step;
use crate::core::types::serde_helpers::{value_to_decimal, value_to_i64};
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::mexc::types::{
    MexcAsset, MexcContract, MexcKlines, MexcOrder, MexcPosition, MexcWsCandle,
};
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "mexc";

pub const SYMBOLS: SeparatedSymbols = SeparatedSymbols {
    separator: "_",
    suffix: "",
};

/// Keyed by the numeric `state`; live orders are refined by `dealVol`.
pub const STATE_TABLE: &[(&str, OrderStatus)] = &[
    ("1", OrderStatus::New),
    ("2", OrderStatus::New),
    ("3", OrderStatus::Filled),
    ("4", OrderStatus::Canceled),
    ("5", OrderStatus::Rejected),
];

pub const OPEN_TYPE_ISOLATED: i64 = 1;
pub const OPEN_TYPE_CROSS: i64 = 2;

const ORDER_TYPE_LIMIT: i64 = 1;
const ORDER_TYPE_POST_ONLY: i64 = 2;
const ORDER_TYPE_MARKET: i64 = 5;

/// MEXC folds direction and intent into `side`.
pub const fn side_to_mexc(side: OrderSide, reduce_only: bool) -> i64 {
    match (side, reduce_only) {
        (OrderSide::Buy, false) => 1,
        (OrderSide::Buy, true) => 2,
        (OrderSide::Sell, false) => 3,
        (OrderSide::Sell, true) => 4,
    }
}

pub const fn side_from_mexc(side: i64) -> OrderSide {
    match side {
        3 | 4 => OrderSide::Sell,
        _ => OrderSide::Buy,
    }
}

pub fn order_type_to_mexc(order_type: OrderType, post_only: bool) -> i64 {
    match order_type {
        OrderType::Market => ORDER_TYPE_MARKET,
        OrderType::Limit if post_only => ORDER_TYPE_POST_ONLY,
        OrderType::Limit => ORDER_TYPE_LIMIT,
    }
}

/// MEXC has no 3m, 2h, 6h or 12h candles.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    match interval {
        KlineInterval::Minutes1 => Some("Min1"),
        KlineInterval::Minutes5 => Some("Min5"),
        KlineInterval::Minutes15 => Some("Min15"),
        KlineInterval::Minutes30 => Some("Min30"),
        KlineInterval::Hours1 => Some("Min60"),
        KlineInterval::Hours4 => Some("Hour4"),
        KlineInterval::Hours8 => Some("Hour8"),
        KlineInterval::Days1 => Some("Day1"),
        KlineInterval::Weeks1 => Some("Week1"),
        KlineInterval::Months1 => Some("Month1"),
        KlineInterval::Minutes3
        | KlineInterval::Hours2
        | KlineInterval::Hours6
        | KlineInterval::Hours12 => None,
    }
}

pub fn convert_status(order: &MexcOrder) -> OrderStatus {
    let status = map_status(EXCHANGE, STATE_TABLE, &order.state.to_string());
    if status == OrderStatus::New && order.deal_vol > Decimal::ZERO {
        OrderStatus::PartiallyFilled
    } else {
        status
    }
}

pub fn convert_order(order: &MexcOrder, instrument: &Instrument) -> Order {
    let info = &instrument.info;
    Order {
        order_id: order.order_id.clone(),
        client_order_id: order.external_oid.clone(),
        symbol: instrument.symbol.clone(),
        side: side_from_mexc(order.side),
        order_type: if order.order_type == ORDER_TYPE_MARKET {
            OrderType::Market
        } else {
            OrderType::Limit
        },
        price: order.price,
        quantity: info.from_contracts(order.vol),
        executed_quantity: info.from_contracts(order.deal_vol),
        average_price: order.deal_avg_price,
        status: convert_status(order),
        created_at: order.create_time,
        updated_at: order.update_time,
    }
    .normalized()
}

/// Neither REST nor the push carries a mark price or unrealized PnL.
pub fn convert_position(position: &MexcPosition, instrument: &Instrument) -> Position {
    let size = instrument.info.from_contracts(position.hold_vol);
    Position {
        symbol: instrument.symbol.clone(),
        size: if position.position_type == 2 { -size } else { size },
        entry_price: position.hold_avg_price,
        mark_price: Decimal::ZERO,
        unrealized_pnl: Decimal::ZERO,
        leverage: position.leverage,
        margin_type: if position.open_type == OPEN_TYPE_ISOLATED {
            MarginType::Isolated
        } else {
            MarginType::Cross
        },
    }
}

pub fn convert_balance(asset: &MexcAsset) -> Balance {
    Balance {
        asset: asset.currency.to_ascii_uppercase(),
        total: asset.available_balance + asset.frozen_balance + asset.position_margin,
        available: asset.available_balance,
    }
}

pub fn convert_symbol_info(contract: &MexcContract) -> SymbolInfo {
    let contract_size = contract.contract_size;
    let vol_unit = if contract.vol_unit > Decimal::ZERO {
        contract.vol_unit
    } else {
        Decimal::ONE
    };
    SymbolInfo {
        price_decimals: if contract.price_unit > Decimal::ZERO {
            decimals_from_step(contract.price_unit)
        } else {
            SymbolInfo::DEFAULT_PRICE_DECIMALS
        },
        quantity_decimals: decimals_from_step(contract_size * vol_unit),
        base_asset: contract.base_coin.to_ascii_uppercase(),
        quote_asset: contract.quote_coin.to_ascii_uppercase(),
        contract_size: (contract_size > Decimal::ZERO).then_some(contract_size),
        lot_size: None,
    }
}

/// Rows of the column arrays, oldest first; `is_closed` is left to the caller.
pub fn convert_klines(
    klines: &MexcKlines,
    symbol: &str,
    interval: KlineInterval,
    info: &SymbolInfo,
) -> Vec<Candle> {
    let column = |values: &[serde_json::Value], i: usize| {
        values.get(i).map(value_to_decimal).unwrap_or_default()
    };
    (0..klines.time.len())
        .map(|i| Candle {
            symbol: symbol.to_string(),
            interval,
            open: column(&klines.open, i),
            high: column(&klines.high, i),
            low: column(&klines.low, i),
            close: column(&klines.close, i),
            volume: info.from_contracts(column(&klines.vol, i)),
            timestamp: value_to_i64(&klines.time[i]) * 1000,
            is_closed: false,
        })
        .collect()
}

pub fn convert_ws_candle(candle: &MexcWsCandle, interval: KlineInterval, info: &SymbolInfo) -> Candle {
    Candle {
        symbol: SYMBOLS.to_generic(&candle.symbol),
        interval,
        open: candle.o,
        high: candle.h,
        low: candle.l,
        close: candle.c,
        volume: info.from_contracts(candle.q),
        timestamp: candle.t * 1000,
        is_closed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instrument() -> Instrument {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = Some("0.0001".parse().unwrap());
        instrument
    }

    #[test]
    fn test_side_encodes_intent() {
        assert_eq!(side_to_mexc(OrderSide::Buy, false), 1);
        assert_eq!(side_to_mexc(OrderSide::Sell, true), 4);
        assert_eq!(side_from_mexc(2), OrderSide::Buy);
        assert_eq!(side_from_mexc(3), OrderSide::Sell);
    }

    #[test]
    fn test_live_order_with_fills_is_partial() {
        let order: MexcOrder = serde_json::from_value(json!({
            "orderId": 102015012431820288_i64, "symbol": "BTC_USDT", "price": 60000.5,
            "vol": 100, "dealVol": 25, "dealAvgPrice": 60000.5, "side": 3, "orderType": 2,
            "state": 2, "externalOid": "abc", "createTime": 1609992674000_i64, "updateTime": 1609992675000_i64
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.order_id, "102015012431820288");
        assert_eq!(converted.side, OrderSide::Sell);
        assert_eq!(converted.order_type, OrderType::Limit);
        assert_eq!(converted.status, OrderStatus::PartiallyFilled);
        assert_eq!(converted.quantity, "0.01".parse::<Decimal>().unwrap());
        assert_eq!(converted.executed_quantity, "0.0025".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_unknown_state_maps_to_new() {
        let order: MexcOrder = serde_json::from_value(json!({
            "orderId": "1", "symbol": "BTC_USDT", "vol": 1, "state": 9
        }))
        .unwrap();
        assert_eq!(convert_status(&order), OrderStatus::New);
    }

    #[test]
    fn test_short_position_is_negative() {
        let position: MexcPosition = serde_json::from_value(json!({
            "symbol": "BTC_USDT", "holdVol": 30, "positionType": 2, "openType": 2,
            "holdAvgPrice": 61000, "leverage": 10
        }))
        .unwrap();
        let converted = convert_position(&position, &instrument());
        assert_eq!(converted.size, "-0.003".parse::<Decimal>().unwrap());
        assert_eq!(converted.margin_type, MarginType::Cross);
    }

    #[test]
    fn test_symbol_info_from_contract() {
        let contract: MexcContract = serde_json::from_value(json!({
            "symbol": "BTC_USDT", "baseCoin": "BTC", "quoteCoin": "USDT",
            "contractSize": 0.0001, "priceUnit": 0.1, "volUnit": 1
        }))
        .unwrap();
        let info = convert_symbol_info(&contract);
        assert_eq!(info.price_decimals, 1);
        assert_eq!(info.quantity_decimals, 4);
        assert_eq!(info.contract_size, Some("0.0001".parse().unwrap()));
    }

    #[test]
    fn test_column_klines_become_rows() {
        let klines: MexcKlines = serde_json::from_value(json!({
            "time": [1609740600, 1609740660],
            "open": [33016.5, 33040.5],
            "close": [33040.5, 33050.0],
            "high": [33094.0, 33060.0],
            "low": [32995.0, 33030.0],
            "vol": [67332, 1000]
        }))
        .unwrap();
        let info = instrument().info;
        let candles = convert_klines(&klines, "BTCUSDT", KlineInterval::Minutes1, &info);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].timestamp, 1_609_740_660_000);
        assert_eq!(candles[0].volume, "6.7332".parse::<Decimal>().unwrap());
    }
}
