use crate::core::normalize::map_status;
use crate::core::symbols::{ConcatenatedSymbols, Instrument};
use crate::core::types::serde_helpers::{value_to_decimal, value_to_i64};
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::bitget::types::{
    BitgetAccount, BitgetCandleRow, BitgetContract, BitgetOrder, BitgetPosition,
};

pub const EXCHANGE: &str = "bitget";

pub const PRODUCT_TYPE: &str = "USDT-FUTURES";

/// v2 mix symbols are the generic spelling.
pub const SYMBOLS: ConcatenatedSymbols = ConcatenatedSymbols;

pub const STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("init", OrderStatus::New),
    ("new", OrderStatus::New),
    ("live", OrderStatus::New),
    ("partially_filled", OrderStatus::PartiallyFilled),
    ("partial-fill", OrderStatus::PartiallyFilled),
    ("filled", OrderStatus::Filled),
    ("full-fill", OrderStatus::Filled),
    ("canceled", OrderStatus::Canceled),
    ("cancelled", OrderStatus::Canceled),
];

pub fn convert_status(raw: &str) -> OrderStatus {
    map_status(EXCHANGE, STATUS_TABLE, raw)
}

pub const fn side_to_bitget(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

/// Granularity names shared by REST and the `candle*` channels.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    Some(match interval {
        KlineInterval::Minutes1 => "1m",
        KlineInterval::Minutes3 => "3m",
        KlineInterval::Minutes5 => "5m",
        KlineInterval::Minutes15 => "15m",
        KlineInterval::Minutes30 => "30m",
        KlineInterval::Hours1 => "1H",
        KlineInterval::Hours4 => "4H",
        KlineInterval::Hours6 => "6H",
        KlineInterval::Hours12 => "12H",
        KlineInterval::Days1 => "1D",
        KlineInterval::Weeks1 => "1W",
        KlineInterval::Months1 => "1M",
        KlineInterval::Hours2 | KlineInterval::Hours8 => return None,
    })
}

pub fn convert_order(order: &BitgetOrder, instrument: &Instrument) -> Order {
    Order {
        order_id: order.order_id.clone(),
        client_order_id: order.client_oid.clone(),
        symbol: instrument.symbol.clone(),
        side: if order.side.eq_ignore_ascii_case("sell") {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        },
        order_type: if order.order_type.eq_ignore_ascii_case("market") {
            OrderType::Market
        } else {
            OrderType::Limit
        },
        price: order.price,
        quantity: order.size,
        executed_quantity: order.base_volume,
        average_price: order.price_avg,
        status: convert_status(&order.state),
        created_at: order.c_time,
        updated_at: order.u_time,
    }
    .normalized()
}

pub fn convert_position(position: &BitgetPosition, instrument: &Instrument) -> Position {
    let size = if position.hold_side.eq_ignore_ascii_case("short") {
        -position.total.abs()
    } else {
        position.total.abs()
    };
    Position {
        symbol: instrument.symbol.clone(),
        size,
        entry_price: position.open_price_avg,
        mark_price: position.mark_price,
        unrealized_pnl: position.unrealized_pl,
        leverage: position.leverage,
        margin_type: if position.margin_mode == "isolated" {
            MarginType::Isolated
        } else {
            MarginType::Cross
        },
    }
}

pub fn convert_balance(account: &BitgetAccount) -> Balance {
    Balance {
        asset: account.margin_coin.to_ascii_uppercase(),
        total: account.account_equity,
        available: account.available,
    }
}

pub fn convert_symbol_info(contract: &BitgetContract) -> SymbolInfo {
    SymbolInfo {
        price_decimals: u32::try_from(contract.price_place)
            .unwrap_or(SymbolInfo::DEFAULT_PRICE_DECIMALS),
        quantity_decimals: u32::try_from(contract.volume_place)
            .unwrap_or(SymbolInfo::DEFAULT_QUANTITY_DECIMALS),
        base_asset: contract.base_coin.clone(),
        quote_asset: contract.quote_coin.clone(),
        contract_size: None,
        lot_size: None,
    }
}

/// Bitget never flags finality; callers decide `is_closed`.
pub fn convert_candle_row(row: &BitgetCandleRow, symbol: &str, interval: KlineInterval) -> Option<Candle> {
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
        volume: value_to_decimal(&row[5]),
        timestamp: value_to_i64(&row[0]),
        is_closed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolMapper;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn instrument() -> Instrument {
        Instrument::resolve(&SYMBOLS, "ETHUSDT").unwrap()
    }

    #[test]
    fn test_symbol_round_trip() {
        for symbol in ["BTCUSDT", "ETHUSDT", "DOGEUSDT"] {
            assert_eq!(SYMBOLS.to_generic(&SYMBOLS.to_native(symbol).unwrap()), symbol);
        }
    }

    #[test]
    fn test_status_table_is_total() {
        for (raw, status) in STATUS_TABLE {
            assert_eq!(convert_status(raw), *status);
        }
        assert_eq!(convert_status("whatever"), OrderStatus::New);
    }

    #[test]
    fn test_rest_and_stream_orders_decode_alike() {
        let rest: BitgetOrder = serde_json::from_value(json!({
            "symbol": "ETHUSDT", "orderId": "1", "clientOid": "c1", "price": "2000",
            "size": "1.5", "baseVolume": "0.5", "priceAvg": "2000", "side": "buy",
            "orderType": "limit", "state": "partially_filled", "cTime": "10", "uTime": "20"
        }))
        .unwrap();
        let stream: BitgetOrder = serde_json::from_value(json!({
            "instId": "ETHUSDT", "orderId": "1", "clientOid": "c1", "price": "2000",
            "size": "1.5", "accBaseVolume": "0.5", "priceAvg": "2000", "side": "buy",
            "orderType": "limit", "status": "partially_filled", "cTime": "10", "uTime": "20"
        }))
        .unwrap();
        let a = convert_order(&rest, &instrument());
        assert_eq!(a, convert_order(&stream, &instrument()));
        assert_eq!(a.executed_quantity, "0.5".parse::<Decimal>().unwrap());
        assert_eq!(a.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_short_position_is_negative() {
        let position: BitgetPosition = serde_json::from_value(json!({
            "symbol": "ETHUSDT", "holdSide": "short", "total": "2", "openPriceAvg": "2100",
            "markPrice": "2050", "unrealizedPL": "100", "leverage": "20", "marginMode": "crossed"
        }))
        .unwrap();
        let converted = convert_position(&position, &instrument());
        assert_eq!(converted.size, Decimal::from(-2));
        assert_eq!(converted.unrealized_pnl, Decimal::from(100));
        assert_eq!(converted.margin_type, MarginType::Cross);
    }

    #[test]
    fn test_contract_precision() {
        let contract: BitgetContract = serde_json::from_value(json!({
            "symbol": "ETHUSDT", "baseCoin": "ETH", "quoteCoin": "USDT",
            "pricePlace": "2", "volumePlace": "2"
        }))
        .unwrap();
        let info = convert_symbol_info(&contract);
        assert_eq!((info.price_decimals, info.quantity_decimals), (2, 2));
        assert_eq!(info.contract_size, None);
    }

    #[test]
    fn test_unsupported_intervals() {
        assert_eq!(interval_code(KlineInterval::Hours2), None);
        assert_eq!(interval_code(KlineInterval::Hours8), None);
        assert_eq!(interval_code(KlineInterval::Hours1), Some("1H"));
    }
}
