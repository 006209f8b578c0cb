use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::mexc::connector::{MexcConnector, MexcEndpoints};
use crate::exchanges::mexc::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::mexc::rest::MexcRest;
use crate::exchanges::mexc::signer::MexcSigner;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub const REST_MAINNET: &str = "https://contract.mexc.com";
pub const WS_MAINNET: &str = "wss://contract.mexc.com/edge";

pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<MexcConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, false)?;
    let signer = Arc::new(MexcSigner::new(credentials));

    // No futures testnet exists
    if config.testnet {
        warn!(exchange = EXCHANGE, "MEXC has no testnet, using mainnet endpoints");
    }
    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_MAINNET, REST_MAINNET),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(signer.clone())
        .build()?;

    build_connector(rest, signer, &config, symbol).await
}

pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    signer: Arc<MexcSigner>,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<MexcConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&MexcRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = MexcEndpoints {
        private_ws_url: config.resolve_ws_url(WS_MAINNET, WS_MAINNET),
        public_ws_url: config.resolve_public_ws_url(WS_MAINNET, WS_MAINNET),
    };
    Ok(MexcConnector::new(
        rest,
        instrument,
        signer,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &MexcRest<R>,
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
    async fn test_missing_key_is_rejected() {
        let config = HashMap::from([("secret_key".to_string(), "secret".to_string())]);
        let err = build_adapter(&config, "BTCUSDT").await.err().unwrap();
        assert!(matches!(
            err,
            ExchangeError::ConfigError(ConfigError::MissingCredential { key, .. }) if key == "api_key"
        ));
    }

    #[tokio::test]
    async fn test_testnet_flag_still_builds() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
            ("testnet".to_string(), "true".to_string()),
            ("base_url".to_string(), "http://127.0.0.1:1".to_string()),
        ]);
        let adapter = build_adapter(&config, "ETHUSDT").await.unwrap();
        assert_eq!(adapter.name(), "mexc");
        assert_eq!(adapter.symbol(), "ETHUSDT");
        assert_eq!(adapter.base_asset(), "ETH");
        assert_eq!(adapter.quote_asset(), "USDT");
    }
}
