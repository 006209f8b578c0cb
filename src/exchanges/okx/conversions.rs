use crate::core::normalize::map_status;
use crate::core::symbols::{Instrument, SeparatedSymbols};
use crate::core::types::conversion::decimals_from_step_str;
use crate::core::types::serde_helpers::{value_to_decimal, value_to_i64};
use crate::core::types::{
    Balance, Candle, KlineInterval, MarginType, Order, OrderSide, OrderStatus, OrderType, Position,
    SymbolInfo,
};
use crate::exchanges::okx::types::{OkxBalanceDetail, OkxCandleRow, OkxInstrument, OkxOrder, OkxPosition};
use rust_decimal::Decimal;

pub const EXCHANGE: &str = "okx";

pub const SYMBOLS: SeparatedSymbols = SeparatedSymbols {
    separator: "-",
    suffix: "-SWAP",
};

pub const STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("live", OrderStatus::New),
    ("partially_filled", OrderStatus::PartiallyFilled),
    ("filled", OrderStatus::Filled),
    ("canceled", OrderStatus::Canceled),
    ("mmp_canceled", OrderStatus::Canceled),
];

pub fn convert_status(raw: &str) -> OrderStatus {
    map_status(EXCHANGE, STATUS_TABLE, raw)
}

pub const fn side_to_okx(side: OrderSide) -> &'static str {
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

/// `limit`, `post_only`, `fok` and `ioc` all rest at a price.
fn convert_order_type(raw: &str) -> OrderType {
    match raw {
        "market" | "optimal_limit_ioc" => OrderType::Market,
        _ => OrderType::Limit,
    }
}

/// OKX bar names; hours and longer are upper-case, 8h does not exist.
pub fn interval_code(interval: KlineInterval) -> Option<&'static str> {
    Some(match interval {
        KlineInterval::Minutes1 => "1m",
        KlineInterval::Minutes3 => "3m",
        KlineInterval::Minutes5 => "5m",
        KlineInterval::Minutes15 => "15m",
        KlineInterval::Minutes30 => "30m",
        KlineInterval::Hours1 => "1H",
        KlineInterval::Hours2 => "2H",
        KlineInterval::Hours4 => "4H",
        KlineInterval::Hours6 => "6H",
        KlineInterval::Hours12 => "12H",
        KlineInterval::Days1 => "1D",
        KlineInterval::Weeks1 => "1W",
        KlineInterval::Months1 => "1M",
        KlineInterval::Hours8 => return None,
    })
}

pub fn convert_order(order: &OkxOrder, instrument: &Instrument) -> Order {
    let info = &instrument.info;
    Order {
        order_id: order.ord_id.clone(),
        client_order_id: order.cl_ord_id.clone(),
        symbol: instrument.symbol.clone(),
        side: convert_side(&order.side),
        order_type: convert_order_type(&order.ord_type),
        price: order.px,
        quantity: info.from_contracts(order.sz),
        executed_quantity: info.from_contracts(order.acc_fill_sz),
        average_price: order.avg_px,
        status: convert_status(&order.state),
        created_at: order.c_time,
        updated_at: order.u_time,
    }
    .normalized()
}

/// Fold long/short mode into a signed base-asset size.
pub fn convert_position(position: &OkxPosition, instrument: &Instrument) -> Position {
    let contracts = match position.pos_side.as_str() {
        "short" => -position.pos.abs(),
        "long" => position.pos.abs(),
        _ => position.pos,
    };
    Position {
        symbol: instrument.symbol.clone(),
        size: instrument.info.from_contracts(contracts),
        entry_price: position.avg_px,
        mark_price: position.mark_px,
        unrealized_pnl: position.upl,
        leverage: position.lever,
        margin_type: if position.mgn_mode == "isolated" {
            MarginType::Isolated
        } else {
            MarginType::Cross
        },
    }
}

pub fn convert_balance(detail: &OkxBalanceDetail) -> Balance {
    let available = if detail.avail_eq.is_zero() {
        detail.avail_bal
    } else {
        detail.avail_eq
    };
    Balance {
        asset: detail.ccy.clone(),
        total: detail.eq,
        available,
    }
}

pub fn convert_symbol_info(instrument: &OkxInstrument) -> SymbolInfo {
    let multiplier = if instrument.ct_mult.is_zero() {
        Decimal::ONE
    } else {
        instrument.ct_mult
    };
    let contract_size = instrument.ct_val * multiplier;
    let lot = instrument
        .lot_sz
        .trim()
        .parse::<Decimal>()
        .ok()
        .filter(|lot| *lot > Decimal::ZERO)
        .unwrap_or(Decimal::ONE);

    let base = if instrument.ct_val_ccy.is_empty() {
        instrument.inst_id.split('-').next().unwrap_or_default().to_string()
    } else {
        instrument.ct_val_ccy.clone()
    };
    SymbolInfo {
        price_decimals: decimals_from_step_str(&instrument.tick_sz)
            .unwrap_or(SymbolInfo::DEFAULT_PRICE_DECIMALS),
        // Smallest tradable base amount is one lot of contracts
        quantity_decimals: (lot * contract_size).normalize().scale(),
        base_asset: base,
        quote_asset: instrument.settle_ccy.clone(),
        contract_size: (!contract_size.is_zero()).then_some(contract_size),
        lot_size: Some(lot),
    }
}

/// Candle row from REST or the `candle*` channel; `confirm == "1"` closes it.
pub fn convert_candle_row(row: &OkxCandleRow, symbol: &str, interval: KlineInterval) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    // volCcy is the base-asset volume for swaps; fall back to contracts
    let volume = row
        .get(6)
        .map(value_to_decimal)
        .filter(|v| !v.is_zero())
        .unwrap_or_else(|| value_to_decimal(&row[5]));
    Some(Candle {
        symbol: symbol.to_string(),
        interval,
        open: value_to_decimal(&row[1]),
        high: value_to_decimal(&row[2]),
        low: value_to_decimal(&row[3]),
        close: value_to_decimal(&row[4]),
        volume,
        timestamp: value_to_i64(&row[0]),
        is_closed: row.get(8).and_then(|v| v.as_str()) == Some("1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolMapper;
    use serde_json::json;

    fn instrument(contract_size: &str) -> Instrument {
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info.contract_size = contract_size.parse().ok();
        instrument
    }

    #[test]
    fn test_symbol_round_trip() {
        for symbol in ["BTCUSDT", "ETHUSDT", "1000PEPEUSDT"] {
            let native = SYMBOLS.to_native(symbol).unwrap();
            assert!(native.ends_with("-USDT-SWAP"));
            assert_eq!(SYMBOLS.to_generic(&native), symbol);
        }
    }

    #[test]
    fn test_status_table_is_total() {
        for (raw, status) in STATUS_TABLE {
            assert_eq!(convert_status(raw), *status);
        }
        assert_eq!(convert_status("something_new"), OrderStatus::New);
    }

    #[test]
    fn test_order_is_converted_from_contracts() {
        let order: OkxOrder = serde_json::from_value(json!({
            "instId": "BTC-USDT-SWAP", "ordId": "312269865356374016", "clOrdId": "b1",
            "px": "", "sz": "3", "ordType": "market", "side": "buy", "state": "filled",
            "accFillSz": "3", "avgPx": "64000.1", "cTime": "1597026383085", "uTime": "1597026383090"
        }))
        .unwrap();
        let converted = convert_order(&order, &instrument("0.01"));
        assert_eq!(converted.quantity, "0.03".parse::<Decimal>().unwrap());
        assert_eq!(converted.executed_quantity, converted.quantity);
        assert_eq!(converted.order_type, OrderType::Market);
        assert_eq!(converted.price, Decimal::ZERO);
        assert_eq!(converted.created_at, 1_597_026_383_085);
    }

    #[test]
    fn test_hedge_mode_short_is_negative() {
        let position: OkxPosition = serde_json::from_value(json!({
            "instId": "BTC-USDT-SWAP", "pos": "5", "posSide": "short", "avgPx": "60000",
            "markPx": "60100", "upl": "-5", "lever": "10", "mgnMode": "isolated"
        }))
        .unwrap();
        let converted = convert_position(&position, &instrument("0.01"));
        assert_eq!(converted.size, "-0.05".parse::<Decimal>().unwrap());
        assert_eq!(converted.margin_type, MarginType::Isolated);
    }

    #[test]
    fn test_symbol_info_from_instrument() {
        let instrument: OkxInstrument = serde_json::from_value(json!({
            "instId": "BTC-USDT-SWAP", "ctVal": "0.01", "ctMult": "1", "tickSz": "0.1",
            "lotSz": "1", "ctValCcy": "BTC", "settleCcy": "USDT"
        }))
        .unwrap();
        let info = convert_symbol_info(&instrument);
        assert_eq!(info.price_decimals, 1);
        assert_eq!(info.quantity_decimals, 2);
        assert_eq!(info.contract_size, Some("0.01".parse().unwrap()));
        assert_eq!(info.base_asset, "BTC");
        assert_eq!(info.quote_asset, "USDT");
    }

    #[test]
    fn test_eight_hours_falls_back() {
        assert_eq!(interval_code(KlineInterval::Hours8), None);
        assert_eq!(interval_code(KlineInterval::Hours4), Some("4H"));
    }

    #[test]
    fn test_candle_confirm_flag() {
        let row: OkxCandleRow = vec![
            json!("1597026383085"), json!("3.721"), json!("3.743"), json!("3.677"),
            json!("3.708"), json!("8422410"), json!("22698348.04828491"),
            json!("12698348.04828491"), json!("0"),
        ];
        let candle = convert_candle_row(&row, "BTCUSDT", KlineInterval::Minutes1).unwrap();
        assert!(!candle.is_closed);
        assert_eq!(candle.timestamp, 1_597_026_383_085);
        assert_eq!(candle.volume, "22698348.04828491".parse::<Decimal>().unwrap());
    }
}
