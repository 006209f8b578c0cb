use crate::core::normalize::map_status;
use crate::core::symbols::{ConcatenatedSymbols, Instrument};
use crate::core::types::conversion::decimals_from_step_str;
use crate::core::types::serde_helpers::{value_to_decimal, value_to_i64};
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::bybit::types::{
    BybitCoinBalance, BybitInstrument, BybitKlineRow, BybitOrder, BybitPosition, BybitWsKline,
};
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "bybit";

/// Linear perpetuals use the generic spelling.
pub const SYMBOLS: ConcatenatedSymbols = ConcatenatedSymbols;

pub const STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("Created", OrderStatus::New),
    ("New", OrderStatus::New),
    ("Untriggered", OrderStatus::New),
    ("Triggered", OrderStatus::New),
    ("PartiallyFilled", OrderStatus::PartiallyFilled),
    ("Filled", OrderStatus::Filled),
    ("Cancelled", OrderStatus::Canceled),
    ("PartiallyFilledCanceled", OrderStatus::Canceled),
    ("Deactivated", OrderStatus::Canceled),
    ("Rejected", OrderStatus::Rejected),
];

pub fn convert_status(raw: &str) -> OrderStatus {
    map_status(EXCHANGE, STATUS_TABLE, raw)
}

pub const fn side_to_bybit(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "Buy",
        OrderSide::Sell => "Sell",
    }
}

fn convert_side(raw: &str) -> OrderSide {
    if raw.eq_ignore_ascii_case("Sell") {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    }
}

pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    Some(match interval {
        KlineInterval::Minutes1 => "1",
        KlineInterval::Minutes3 => "3",
        KlineInterval::Minutes5 => "5",
        KlineInterval::Minutes15 => "15",
        KlineInterval::Minutes30 => "30",
        KlineInterval::Hours1 => "60",
        KlineInterval::Hours2 => "120",
        KlineInterval::Hours4 => "240",
        KlineInterval::Hours6 => "360",
        KlineInterval::Hours12 => "720",
        KlineInterval::Days1 => "D",
        KlineInterval::Weeks1 => "W",
        KlineInterval::Months1 => "M",
        KlineInterval::Hours8 => return None,
    })
}

pub fn convert_order(order: &BybitOrder, instrument: &Instrument) -> Order {
    Order {
        order_id: order.order_id.clone(),
        client_order_id: order.order_link_id.clone(),
        symbol: instrument.symbol.clone(),
        side: convert_side(&order.side),
        order_type: if order.order_type.eq_ignore_ascii_case("Market") {
            OrderType::Market
        } else {
            OrderType::Limit
        },
        price: order.price,
        quantity: order.qty,
        executed_quantity: order.cum_exec_qty,
        average_price: order.avg_price,
        status: convert_status(&order.order_status),
        created_at: order.created_time,
        updated_at: order.updated_time,
    }
    .normalized()
}

pub fn convert_position(position: &BybitPosition, instrument: &Instrument) -> Position {
    let size = if position.side.eq_ignore_ascii_case("Sell") {
        -position.size.abs()
    } else {
        position.size.abs()
    };
    Position {
        symbol: instrument.symbol.clone(),
        size,
        entry_price: position.avg_price,
        mark_price: position.mark_price,
        unrealized_pnl: position.unrealised_pnl,
        leverage: position.leverage,
        margin_type: if position.trade_mode == 1 {
            MarginType::Isolated
        } else {
            MarginType::Cross
        },
    }
}

/// Unified accounts leave `availableToWithdraw` empty; derive it from margin use.
pub fn convert_balance(coin: &BybitCoinBalance) -> Balance {
    let available = if coin.available_to_withdraw.is_zero() {
        (coin.wallet_balance - coin.total_position_im - coin.total_order_im).max(Decimal::ZERO)
    } else {
        coin.available_to_withdraw
    };
    Balance {
        asset: coin.coin.clone(),
        total: coin.wallet_balance,
        available,
    }
}

pub fn convert_symbol_info(instrument: &BybitInstrument) -> SymbolInfo {
    SymbolInfo {
        price_decimals: decimals_from_step_str(&instrument.price_filter.tick_size)
            .unwrap_or(SymbolInfo::DEFAULT_PRICE_DECIMALS),
        quantity_decimals: decimals_from_step_str(&instrument.lot_size_filter.qty_step)
            .unwrap_or(SymbolInfo::DEFAULT_QUANTITY_DECIMALS),
        base_asset: instrument.base_coin.clone(),
        quote_asset: instrument.quote_coin.clone(),
        contract_size: None,
        lot_size: None,
    }
}

/// REST rows carry no finality flag; a bucket is closed once its end has passed.
pub fn convert_kline_row(
    row: &BybitKlineRow,
    symbol: &str,
    interval: KlineInterval,
    now_ms: i64,
) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    let timestamp = value_to_i64(&row[0]);
    Some(Candle {
        symbol: symbol.to_string(),
        interval,
        open: value_to_decimal(&row[1]),
        high: value_to_decimal(&row[2]),
        low: value_to_decimal(&row[3]),
        close: value_to_decimal(&row[4]),
        volume: value_to_decimal(&row[5]),
        timestamp,
        is_closed: timestamp + interval.minutes() * 60_000 <= now_ms,
    })
}

pub fn convert_ws_kline(kline: &BybitWsKline, symbol: &str, interval: KlineInterval) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        interval,
        open: kline.open,
        high: kline.high,
        low: kline.low,
        close: kline.close,
        volume: kline.volume,
        timestamp: kline.start,
        is_closed: kline.confirm,
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
        for symbol in ["BTCUSDT", "SOLUSDT", "1000PEPEUSDT"] {
            assert_eq!(SYMBOLS.to_generic(&SYMBOLS.to_native(symbol).unwrap()), symbol);
        }
    }

    #[test]
    fn test_status_table_is_total() {
        for (raw, status) in STATUS_TABLE {
            assert_eq!(convert_status(raw), *status);
        }
        assert_eq!(convert_status("MysteryState"), OrderStatus::New);
    }

    #[test]
    fn test_filled_market_order_adopts_executed_quantity() {
        let order: BybitOrder = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "orderId": "fd4300ae", "orderLinkId": "", "side": "Sell",
            "orderType": "Market", "price": "", "qty": "0", "cumExecQty": "0.5",
            "avgPrice": "60000", "orderStatus": "Filled", "createdTime": "1684738540559",
            "updatedTime": "1684738540561"
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument());
        assert_eq!(converted.quantity, "0.5".parse::<Decimal>().unwrap());
        assert_eq!(converted.executed_quantity, converted.quantity);
        assert_eq!(converted.side, OrderSide::Sell);
        assert_eq!(converted.order_type, OrderType::Market);
    }

    #[test]
    fn test_short_position_is_negative() {
        let position: BybitPosition = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "side": "Sell", "size": "0.3", "avgPrice": "61000",
            "markPrice": "60500", "unrealisedPnl": "150", "leverage": "5", "tradeMode": 0
        }))
        .unwrap();
        let converted = convert_position(&position, &instrument());
        assert_eq!(converted.size, "-0.3".parse::<Decimal>().unwrap());
        assert_eq!(converted.margin_type, MarginType::Cross);
    }

    #[test]
    fn test_unified_balance_derives_available() {
        let coin: BybitCoinBalance = serde_json::from_value(json!({
            "coin": "USDT", "walletBalance": "1000", "equity": "1010",
            "availableToWithdraw": "", "totalPositionIM": "200", "totalOrderIM": "50"
        }))
        .unwrap();
        let balance = convert_balance(&coin);
        assert_eq!(balance.available, Decimal::from(750));
    }

    #[test]
    fn test_kline_row_finality_from_clock() {
        let row: BybitKlineRow = vec![
            json!("1670608800000"), json!("17071"), json!("17073"), json!("17027"),
            json!("17055.5"), json!("268611"), json!("15.74462667"),
        ];
        let open = convert_kline_row(&row, "BTCUSDT", KlineInterval::Minutes1, 1_670_608_830_000).unwrap();
        assert!(!open.is_closed);
        let closed = convert_kline_row(&row, "BTCUSDT", KlineInterval::Minutes1, 1_670_608_860_000).unwrap();
        assert!(closed.is_closed);
    }

    #[test]
    fn test_eight_hours_falls_back() {
        assert_eq!(interval_code(KlineInterval::Hours8), None);
        assert_eq!(interval_code(KlineInterval::Days1), Some("D"));
    }
}
