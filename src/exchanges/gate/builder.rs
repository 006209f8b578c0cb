use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::gate::connector::{GateConnector, GateEndpoints};
use crate::exchanges::gate::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::gate::rest::GateRest;
use crate::exchanges::gate::signer::GateSigner;
use std::collections::HashMap;
use std::sync::Arc;

pub const REST_MAINNET: &str = "https://api.gateio.ws";
pub const REST_TESTNET: &str = "https://fx-api-testnet.gateio.ws";
pub const WS_MAINNET: &str = "wss://fx-ws.gateio.ws/v4/ws/usdt";
pub const WS_TESTNET: &str = "wss://fx-ws-testnet.gateio.ws/v4/ws/usdt";

pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<GateConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, false)?;
    let signer = Arc::new(GateSigner::new(credentials));

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_MAINNET, REST_TESTNET),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(signer.clone())
        .build()?;

    build_connector(rest, signer, &config, symbol).await
}

pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    signer: Arc<GateSigner>,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<GateConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&GateRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = GateEndpoints {
        private_ws_url: config.resolve_ws_url(WS_MAINNET, WS_TESTNET),
        public_ws_url: config.resolve_public_ws_url(WS_MAINNET, WS_TESTNET),
    };
    Ok(GateConnector::new(
        rest,
        instrument,
        signer,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &GateRest<R>,
    contract: &str,
) -> Result<SymbolInfo, ExchangeError> {
    let contract = rest.get_contract(contract).await?;
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
    async fn test_no_passphrase_needed() {
        let config = HashMap::from([
            ("api_key".to_string(), "key".to_string()),
            ("secret_key".to_string(), "secret".to_string()),
            ("base_url".to_string(), "http://127.0.0.1:1".to_string()),
        ]);
        let adapter = build_adapter(&config, "BTCUSDT").await.unwrap();
        assert_eq!(adapter.name(), "gate");
        assert_eq!(adapter.symbol(), "BTCUSDT");
        assert_eq!(adapter.symbol_info().contract_size, None);
    }
}
