use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::bybit::connector::{BybitConnector, BybitEndpoints};
use crate::exchanges::bybit::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::bybit::rest::BybitRest;
use crate::exchanges::bybit::signer::BybitSigner;
use std::collections::HashMap;
use std::sync::Arc;

pub const REST_MAINNET: &str = "https://api.bybit.com";
pub const REST_TESTNET: &str = "https://api-testnet.bybit.com";
pub const WS_PRIVATE_MAINNET: &str = "wss://stream.bybit.com/v5/private";
pub const WS_PRIVATE_TESTNET: &str = "wss://stream-testnet.bybit.com/v5/private";
pub const WS_PUBLIC_MAINNET: &str = "wss://stream.bybit.com/v5/public/linear";
pub const WS_PUBLIC_TESTNET: &str = "wss://stream-testnet.bybit.com/v5/public/linear";

/// Build a Bybit adapter from a config map.
pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<BybitConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let signer = Arc::new(BybitSigner::new(config.credentials(EXCHANGE, false)?));

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_MAINNET, REST_TESTNET),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(signer.clone())
        .build()?;

    build_connector(rest, signer, &config, symbol).await
}

/// Wire a connector around an existing REST client.
pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    signer: Arc<BybitSigner>,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<BybitConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&BybitRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = BybitEndpoints {
        private_ws_url: config.resolve_ws_url(WS_PRIVATE_MAINNET, WS_PRIVATE_TESTNET),
        public_ws_url: config.resolve_public_ws_url(WS_PUBLIC_MAINNET, WS_PUBLIC_TESTNET),
    };
    Ok(BybitConnector::new(
        rest,
        instrument,
        signer,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &BybitRest<R>,
    symbol: &str,
) -> Result<SymbolInfo, ExchangeError> {
    rest.get_instrument(symbol)
        .await
        .map(|instrument| convert_symbol_info(&instrument))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::ExchangeAdapter;

    #[tokio::test]
    async fn test_unreachable_metadata_falls_back_to_defaults() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
            ("base_url".to_string(), "http://127.0.0.1:1".to_string()),
        ]);
        let adapter = build_adapter(&config, "SOLUSDT").await.unwrap();
        assert_eq!(adapter.name(), "bybit");
        assert_eq!(adapter.symbol(), "SOLUSDT");
        assert_eq!(adapter.price_decimals(), 2);
        assert_eq!(adapter.quantity_decimals(), 4);
        assert_eq!(adapter.base_asset(), "SOL");
    }

    #[tokio::test]
    async fn test_unsplittable_symbol_is_rejected() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
        ]);
        assert!(build_adapter(&config, "FOO").await.is_err());
    }
}
