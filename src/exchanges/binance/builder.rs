use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::binance::connector::{BinanceConnector, BinanceEndpoints};
use crate::exchanges::binance::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::binance::rest::BinanceRest;
use crate::exchanges::binance::signer::BinanceSigner;
use std::collections::HashMap;
use std::sync::Arc;

pub const REST_MAINNET: &str = "https://fapi.binance.com";
pub const REST_TESTNET: &str = "https://testnet.binancefuture.com";
pub const WS_MAINNET: &str = "wss://fstream.binance.com/ws";
pub const WS_TESTNET: &str = "wss://stream.binancefuture.com/ws";

/// Build a Binance adapter from a config map.
pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<BinanceConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, false)?;

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_MAINNET, REST_TESTNET),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(Arc::new(BinanceSigner::new(credentials)))
        .build()?;

    build_connector(rest, &config, symbol).await
}

/// Wire a connector around an existing REST client.
pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<BinanceConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&BinanceRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = BinanceEndpoints {
        private_ws_url: config.resolve_ws_url(WS_MAINNET, WS_TESTNET),
        public_ws_url: config.resolve_public_ws_url(WS_MAINNET, WS_TESTNET),
    };
    Ok(BinanceConnector::new(
        rest,
        instrument,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &BinanceRest<R>,
    native: &str,
) -> Result<SymbolInfo, ExchangeError> {
    let info = rest.get_exchange_info().await?;
    info.symbols
        .iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(native))
        .map(convert_symbol_info)
        .ok_or_else(|| ExchangeError::UnsupportedSymbol(native.to_string()))
}
