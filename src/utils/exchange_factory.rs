use crate::core::config::ConfigError;
use crate::core::errors::ExchangeError;
use crate::core::traits::ExchangeAdapter;
use crate::exchanges::{binance, bingx, bitget, bybit, gate, kucoin, mexc, okx};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExchangeKind {
    Binance,
    Bybit,
    Okx,
    Bitget,
    Gate,
    Kucoin,
    Mexc,
    Bingx,
}

impl ExchangeKind {
    pub const ALL: [Self; 8] = [
        Self::Binance,
        Self::Bybit,
        Self::Okx,
        Self::Bitget,
        Self::Gate,
        Self::Kucoin,
        Self::Mexc,
        Self::Bingx,
    ];

    /// Lowercase name used as the registry key and in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Bybit => "bybit",
            Self::Okx => "okx",
            Self::Bitget => "bitget",
            Self::Gate => "gate",
            Self::Kucoin => "kucoin",
            Self::Mexc => "mexc",
            Self::Bingx => "bingx",
        }
    }

    /// Whether construction fails without a `passphrase`.
    pub const fn requires_passphrase(self) -> bool {
        matches!(self, Self::Okx | Self::Bitget | Self::Kucoin)
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "gateio" | "gate.io" => "gate",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                ExchangeError::ConfigError(ConfigError::InvalidConfiguration(format!(
                    "unsupported exchange: {}",
                    s
                )))
            })
    }
}

/// Adapters keyed by exchange and generic symbol.
///
/// The registry only hands out shared handles; every adapter keeps ownership
/// of its REST client and stream sessions.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(ExchangeKind, String), Arc<dyn ExchangeAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an adapter for `kind` bound to `symbol`.
    pub async fn create(
        kind: ExchangeKind,
        config: &HashMap<String, String>,
        symbol: &str,
    ) -> Result<Arc<dyn ExchangeAdapter>, ExchangeError> {
        let adapter: Arc<dyn ExchangeAdapter> = match kind {
            ExchangeKind::Binance => Arc::new(binance::build_adapter(config, symbol).await?),
            ExchangeKind::Bybit => Arc::new(bybit::build_adapter(config, symbol).await?),
            ExchangeKind::Okx => Arc::new(okx::build_adapter(config, symbol).await?),
            ExchangeKind::Bitget => Arc::new(bitget::build_adapter(config, symbol).await?),
            ExchangeKind::Gate => Arc::new(gate::build_adapter(config, symbol).await?),
            ExchangeKind::Kucoin => Arc::new(kucoin::build_adapter(config, symbol).await?),
            ExchangeKind::Mexc => Arc::new(mexc::build_adapter(config, symbol).await?),
            ExchangeKind::Bingx => Arc::new(bingx::build_adapter(config, symbol).await?),
        };
        info!(
            exchange = %kind,
            symbol = adapter.symbol(),
            price_decimals = adapter.price_decimals(),
            quantity_decimals = adapter.quantity_decimals(),
            "Adapter created"
        );
        Ok(adapter)
    }

    /// Create an adapter and keep it, replacing any previous one for the same pair.
    pub async fn add(
        &mut self,
        kind: ExchangeKind,
        config: &HashMap<String, String>,
        symbol: &str,
    ) -> Result<Arc<dyn ExchangeAdapter>, ExchangeError> {
        let adapter = Self::create(kind, config, symbol).await?;
        self.insert(kind, Arc::clone(&adapter));
        Ok(adapter)
    }

    pub fn insert(&mut self, kind: ExchangeKind, adapter: Arc<dyn ExchangeAdapter>) {
        let key = (kind, adapter.symbol().to_string());
        self.adapters.insert(key, adapter);
    }

    pub fn get(&self, kind: ExchangeKind, symbol: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters
            .get(&(kind, symbol.to_ascii_uppercase()))
            .cloned()
    }

    pub fn remove(&mut self, kind: ExchangeKind, symbol: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.remove(&(kind, symbol.to_ascii_uppercase()))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registered `(exchange, symbol)` pairs in a stable order.
    pub fn keys(&self) -> Vec<(ExchangeKind, String)> {
        let mut keys: Vec<_> = self.adapters.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop every running stream; failures are logged per adapter.
    pub async fn shutdown(&self) {
        for ((kind, symbol), adapter) in &self.adapters {
            if let Err(e) = adapter.stop_order_stream().await {
                tracing::warn!(exchange = %kind, symbol = %symbol, error = %e, "Failed to stop order stream");
            }
            if let Err(e) = adapter.stop_kline_stream().await {
                tracing::warn!(exchange = %kind, symbol = %symbol, error = %e, "Failed to stop kline stream");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_case_insensitively() {
        assert_eq!("OKX".parse::<ExchangeKind>().unwrap(), ExchangeKind::Okx);
        assert_eq!(" BingX ".parse::<ExchangeKind>().unwrap(), ExchangeKind::Bingx);
        assert_eq!("gateio".parse::<ExchangeKind>().unwrap(), ExchangeKind::Gate);
        assert!("ftx".parse::<ExchangeKind>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for kind in ExchangeKind::ALL {
            assert_eq!(kind.to_string().parse::<ExchangeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_passphrase_exchanges() {
        let needing: Vec<_> = ExchangeKind::ALL
            .into_iter()
            .filter(|k| k.requires_passphrase())
            .collect();
        assert_eq!(
            needing,
            vec![ExchangeKind::Okx, ExchangeKind::Bitget, ExchangeKind::Kucoin]
        );
    }
}
