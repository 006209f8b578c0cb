//! Normalization helpers shared by every exchange adapter.

use crate::core::types::{Candle, KlineInterval, OrderStatus, Position};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Look up an exchange status in a fixed table.
///
/// Unknown strings map to `New`: an order the engine still considers open is
/// the conservative reading of a status we cannot interpret.
pub fn map_status(exchange: &str, table: &[(&str, OrderStatus)], raw: &str) -> OrderStatus {
    table
        .iter()
        .find(|(native, _)| native.eq_ignore_ascii_case(raw))
        .map_or_else(
            || {
                debug!(exchange, status = %raw, "Unmapped order status, treating as New");
                OrderStatus::New
            },
            |(_, status)| *status,
        )
}

/// Drop flat positions before they reach the engine.
pub fn retain_open_positions(positions: Vec<Position>) -> Vec<Position> {
    positions
        .into_iter()
        .filter(|p| !p.size.is_zero())
        .collect()
}

/// Resolve an exchange interval code, falling back to the 1-minute code when
/// the exchange has no equivalent.
pub fn resolve_interval(
    exchange: &str,
    interval: KlineInterval,
    lookup: fn(KlineInterval) -> Option<&'static str>,
) -> (KlineInterval, &'static str) {
    if let Some(code) = lookup(interval) {
        return (interval, code);
    }
    let fallback = KlineInterval::DEFAULT;
    tracing::warn!(
        exchange,
        interval = %interval,
        fallback = %fallback,
        "Interval not offered by exchange"
    );
    (fallback, lookup(fallback).unwrap_or("1m"))
}

/// Derives `is_closed` for exchanges that never flag candle finality.
///
/// Every update is forwarded as provisional. When a newer bucket starts for a
/// (symbol, interval), the last seen candle of the previous bucket is emitted
/// once more with `is_closed = true` ahead of the new one.
#[derive(Debug, Default)]
pub struct CandleCloser {
    last: Mutex<HashMap<(String, KlineInterval), Candle>>,
}

impl CandleCloser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, candle: Candle) -> Vec<Candle> {
        let key = (candle.symbol.clone(), candle.interval);
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut out = Vec::with_capacity(2);
        match last.get(&key) {
            // Late update for a bucket already closed
            Some(prev) if candle.timestamp < prev.timestamp => return out,
            Some(prev) if candle.timestamp > prev.timestamp => {
                let mut closed = prev.clone();
                closed.is_closed = true;
                out.push(closed);
            }
            _ => {}
        }

        last.insert(key, candle.clone());
        out.push(candle);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MarginType;
    use rust_decimal::Decimal;

    const TABLE: &[(&str, OrderStatus)] = &[
        ("NEW", OrderStatus::New),
        ("FILLED", OrderStatus::Filled),
    ];

    fn candle(ts: i64, close: i64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            interval: KlineInterval::Minutes1,
            open: Decimal::ONE,
            high: Decimal::from(close),
            low: Decimal::ONE,
            close: Decimal::from(close),
            volume: Decimal::ONE,
            timestamp: ts,
            is_closed: false,
        }
    }

    #[test]
    fn test_map_status_defaults_to_new() {
        assert_eq!(map_status("test", TABLE, "filled"), OrderStatus::Filled);
        assert_eq!(map_status("test", TABLE, "SOMETHING_ELSE"), OrderStatus::New);
        assert_eq!(map_status("test", TABLE, ""), OrderStatus::New);
    }

    #[test]
    fn test_retain_open_positions() {
        let make = |size: i64| Position {
            symbol: "BTCUSDT".to_string(),
            size: Decimal::from(size),
            entry_price: Decimal::ZERO,
            mark_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            leverage: Decimal::ONE,
            margin_type: MarginType::Cross,
        };
        let kept = retain_open_positions(vec![make(0), make(2), make(-1)]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_resolve_interval_falls_back() {
        fn lookup(i: KlineInterval) -> Option<&'static str> {
            match i {
                KlineInterval::Minutes1 => Some("Min1"),
                KlineInterval::Hours1 => Some("Min60"),
                _ => None,
            }
        }
        assert_eq!(
            resolve_interval("test", KlineInterval::Hours1, lookup),
            (KlineInterval::Hours1, "Min60")
        );
        assert_eq!(
            resolve_interval("test", KlineInterval::Hours2, lookup),
            (KlineInterval::Minutes1, "Min1")
        );
    }

    #[test]
    fn test_candle_closer_forwards_provisional_updates() {
        let closer = CandleCloser::new();
        assert_eq!(closer.observe(candle(60_000, 10)).len(), 1);
        // Same bucket again: still delivered
        let again = closer.observe(candle(60_000, 11));
        assert_eq!(again.len(), 1);
        assert!(!again[0].is_closed);

        let rolled = closer.observe(candle(120_000, 12));
        assert_eq!(rolled.len(), 2);
        assert!(rolled[0].is_closed);
        assert_eq!(rolled[0].close, Decimal::from(11));
        assert!(!rolled[1].is_closed);

        assert!(closer.observe(candle(60_000, 9)).is_empty());
    }
}
