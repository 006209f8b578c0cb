use crate::core::errors::ExchangeError;
use crate::core::types::SymbolInfo;

/// Quote assets recognized when splitting a generic symbol, longest first so
/// `BTCUSDT` is not read as `BTCUSD` + `T`.
pub const KNOWN_QUOTES: [&str; 6] = ["USDT", "USDC", "BUSD", "USD", "BTC", "ETH"];

/// Split a generic symbol (`BTCUSDT`) into base and quote.
pub fn split_generic(symbol: &str) -> Result<(String, String), ExchangeError> {
    let upper = symbol.trim().to_ascii_uppercase();
    for quote in KNOWN_QUOTES {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return Ok((base.to_string(), quote.to_string()));
            }
        }
    }
    Err(ExchangeError::UnsupportedSymbol(symbol.to_string()))
}

pub fn join_generic(base: &str, quote: &str) -> String {
    format!("{}{}", base.to_ascii_uppercase(), quote.to_ascii_uppercase())
}

/// Per-exchange symbol spelling.
///
/// `to_native` fails for symbols that cannot be split into base and quote;
/// `to_generic` is best-effort and returns the input unchanged when the
/// native form is not recognized.
pub trait SymbolMapper: Send + Sync {
    fn to_native(&self, generic: &str) -> Result<String, ExchangeError>;
    fn to_generic(&self, native: &str) -> String;
}

/// Mapper for exchanges that join base and quote with a separator and an
/// optional suffix, e.g. `BTC-USDT`, `BTC_USDT`, `BTC-USDT-SWAP`.
#[derive(Debug, Clone, Copy)]
pub struct SeparatedSymbols {
    pub separator: &'static str,
    pub suffix: &'static str,
}

impl SymbolMapper for SeparatedSymbols {
    fn to_native(&self, generic: &str) -> Result<String, ExchangeError> {
        let (base, quote) = split_generic(generic)?;
        Ok(format!("{}{}{}{}", base, self.separator, quote, self.suffix))
    }

    fn to_generic(&self, native: &str) -> String {
        let trimmed = native.strip_suffix(self.suffix).unwrap_or(native);
        trimmed.split(self.separator).collect::<String>().to_ascii_uppercase()
    }
}

/// Mapper for exchanges whose native spelling is the generic one.
#[derive(Debug, Clone, Copy)]
pub struct ConcatenatedSymbols;

impl SymbolMapper for ConcatenatedSymbols {
    fn to_native(&self, generic: &str) -> Result<String, ExchangeError> {
        let (base, quote) = split_generic(generic)?;
        Ok(join_generic(&base, &quote))
    }

    fn to_generic(&self, native: &str) -> String {
        native.to_ascii_uppercase()
    }
}

/// The symbol an adapter is bound to, in both spellings, with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    /// Generic spelling, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Exchange spelling, e.g. `BTC-USDT-SWAP`.
    pub native: String,
    pub info: SymbolInfo,
}

impl Instrument {
    /// Resolve `symbol` through `mapper` with fallback metadata.
    pub fn resolve(mapper: &dyn SymbolMapper, symbol: &str) -> Result<Self, ExchangeError> {
        let (base, quote) = split_generic(symbol)?;
        Ok(Self {
            symbol: join_generic(&base, &quote),
            native: mapper.to_native(symbol)?,
            info: SymbolInfo::fallback(base, quote),
        })
    }

    #[must_use]
    pub fn with_info(mut self, info: SymbolInfo) -> Self {
        self.info = info;
        self
    }

    /// Adopt fetched metadata; on failure keep the fallback and log it.
    #[must_use]
    pub fn with_fetched_info(self, exchange: &str, fetched: Result<SymbolInfo, ExchangeError>) -> Self {
        match fetched {
            Ok(info) => self.with_info(info),
            Err(e) => {
                tracing::warn!(
                    exchange,
                    symbol = %self.symbol,
                    error = %e,
                    price_decimals = self.info.price_decimals,
                    quantity_decimals = self.info.quantity_decimals,
                    "Symbol metadata unavailable, using default precision"
                );
                self
            }
        }
    }

    pub fn is_native(&self, native: &str) -> bool {
        self.native.eq_ignore_ascii_case(native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_generic() {
        assert_eq!(
            split_generic("BTCUSDT").unwrap(),
            ("BTC".to_string(), "USDT".to_string())
        );
        assert_eq!(
            split_generic("ethusdc").unwrap(),
            ("ETH".to_string(), "USDC".to_string())
        );
        assert_eq!(
            split_generic("1000PEPEUSDT").unwrap(),
            ("1000PEPE".to_string(), "USDT".to_string())
        );
        assert!(split_generic("USDT").is_err());
        assert!(split_generic("FOO").is_err());
    }

    #[test]
    fn test_separated_round_trip() {
        let okx = SeparatedSymbols {
            separator: "-",
            suffix: "-SWAP",
        };
        assert_eq!(okx.to_native("BTCUSDT").unwrap(), "BTC-USDT-SWAP");
        assert_eq!(okx.to_generic("BTC-USDT-SWAP"), "BTCUSDT");

        let gate = SeparatedSymbols {
            separator: "_",
            suffix: "",
        };
        for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT", "1000PEPEUSDT"] {
            assert_eq!(gate.to_generic(&gate.to_native(symbol).unwrap()), symbol);
        }
    }

    #[test]
    fn test_instrument_resolve_uses_fallback_info() {
        let mapper = SeparatedSymbols {
            separator: "_",
            suffix: "",
        };
        let instrument = Instrument::resolve(&mapper, "ethusdt").unwrap();
        assert_eq!(instrument.symbol, "ETHUSDT");
        assert_eq!(instrument.native, "ETH_USDT");
        assert_eq!(instrument.info.price_decimals, 2);
        assert_eq!(instrument.info.quantity_decimals, 4);
        assert_eq!(instrument.info.base_asset, "ETH");
        assert!(instrument.is_native("eth_usdt"));
        assert!(Instrument::resolve(&mapper, "NOPE").is_err());
    }
}
