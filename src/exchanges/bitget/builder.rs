use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::bitget::connector::{BitgetConnector, BitgetEndpoints};
use crate::exchanges::bitget::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::bitget::rest::BitgetRest;
use crate::exchanges::bitget::signer::BitgetSigner;
use std::collections::HashMap;
use std::sync::Arc;

/// Demo trading uses the same REST host with a `paptrading` header.
pub const REST_URL: &str = "https://api.bitget.com";
pub const WS_PRIVATE_MAINNET: &str = "wss://ws.bitget.com/v2/ws/private";
pub const WS_PRIVATE_TESTNET: &str = "wss://wspap.bitget.com/v2/ws/private";
pub const WS_PUBLIC_MAINNET: &str = "wss://ws.bitget.com/v2/ws/public";
pub const WS_PUBLIC_TESTNET: &str = "wss://wspap.bitget.com/v2/ws/public";

pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<BitgetConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, true)?;
    let signer = Arc::new(BitgetSigner::new(credentials, config.testnet));

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_URL, REST_URL),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(signer.clone())
        .build()?;

    build_connector(rest, signer, &config, symbol).await
}

pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    signer: Arc<BitgetSigner>,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<BitgetConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&BitgetRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = BitgetEndpoints {
        private_ws_url: config.resolve_ws_url(WS_PRIVATE_MAINNET, WS_PRIVATE_TESTNET),
        public_ws_url: config.resolve_public_ws_url(WS_PUBLIC_MAINNET, WS_PUBLIC_TESTNET),
    };
    Ok(BitgetConnector::new(
        rest,
        instrument,
        signer,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &BitgetRest<R>,
    symbol: &str,
) -> Result<SymbolInfo, ExchangeError> {
    let contract = rest.get_contract(symbol).await?;
    Ok(convert_symbol_info(&contract))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigError;
    use crate::core::traits::ExchangeAdapter;

    #[tokio::test]
    async fn test_passphrase_is_required() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
        ]);
        let err = build_adapter(&config, "ETHUSDT").await.err().unwrap();
        assert!(matches!(
            err,
            ExchangeError::ConfigError(ConfigError::MissingCredential { key, .. }) if key == "passphrase"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_metadata_falls_back() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
            ("passphrase".to_string(), "phrase".to_string()),
            ("base_url".to_string(), "http://127.0.0.1:1".to_string()),
        ]);
        let adapter = build_adapter(&config, "ETHUSDT").await.unwrap();
        assert_eq!(adapter.name(), "bitget");
        assert_eq!(adapter.price_decimals(), 2);
        assert_eq!(adapter.quantity_decimals(), 4);
        assert_eq!(adapter.base_asset(), "ETH");
    }
}
