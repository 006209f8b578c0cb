use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::bingx::connector::{BingxConnector, BingxEndpoints};
use crate::exchanges::bingx::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::bingx::rest::BingxRest;
use crate::exchanges::bingx::signer::BingxSigner;
use std::collections::HashMap;
use std::sync::Arc;

pub const REST_MAINNET: &str = "https://open-api.bingx.com";
/// Virtual (VST) trading environment.
pub const REST_TESTNET: &str = "https://open-api-vst.bingx.com";
pub const WS_MAINNET: &str = "wss://open-api-swap.bingx.com/swap-market";
pub const WS_TESTNET: &str = "wss://vst-open-api-ws.bingx.com/swap-market";

pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<BingxConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, false)?;

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_MAINNET, REST_TESTNET),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(Arc::new(BingxSigner::new(credentials)))
        .build()?;

    build_connector(rest, &config, symbol).await
}

pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<BingxConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&BingxRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = BingxEndpoints {
        private_ws_url: config.resolve_ws_url(WS_MAINNET, WS_TESTNET),
        public_ws_url: config.resolve_public_ws_url(WS_MAINNET, WS_TESTNET),
    };
    Ok(BingxConnector::new(
        rest,
        instrument,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &BingxRest<R>,
    native: &str,
) -> Result<SymbolInfo, ExchangeError> {
    let contract = rest.get_contract(native).await?;
    Ok(convert_symbol_info(&contract))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigError;
    use crate::core::traits::ExchangeAdapter;

    #[tokio::test]
    async fn test_missing_secret_is_rejected() {
        let config = HashMap::from([("api_key".to_string(), "key".to_string())]);
        let err = build_adapter(&config, "BTCUSDT").await.err().unwrap();
        assert!(matches!(
            err,
            ExchangeError::ConfigError(ConfigError::MissingCredential { key, .. }) if key == "secret_key"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_falls_back_to_default_precision() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
            ("base_url".to_string(), "http://127.0.0.1:1".to_string()),
        ]);
        let adapter = build_adapter(&config, "SOLUSDT").await.unwrap();
        assert_eq!(adapter.name(), "bingx");
        assert_eq!(adapter.price_decimals(), SymbolInfo::DEFAULT_PRICE_DECIMALS);
        assert_eq!(adapter.quantity_decimals(), SymbolInfo::DEFAULT_QUANTITY_DECIMALS);
    }
}
