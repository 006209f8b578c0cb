use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::okx::connector::{OkxConnector, OkxEndpoints};
use crate::exchanges::okx::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::okx::rest::OkxRest;
use crate::exchanges::okx::signer::OkxSigner;
use std::collections::HashMap;
use std::sync::Arc;

/// Demo trading shares the REST host and is selected by header.
pub const REST_URL: &str = "https://www.okx.com";
pub const WS_PRIVATE_MAINNET: &str = "wss://ws.okx.com:8443/ws/v5/private";
pub const WS_PRIVATE_TESTNET: &str = "wss://wspap.okx.com:8443/ws/v5/private";
pub const WS_BUSINESS_MAINNET: &str = "wss://ws.okx.com:8443/ws/v5/business";
pub const WS_BUSINESS_TESTNET: &str = "wss://wspap.okx.com:8443/ws/v5/business";

/// Build an OKX adapter from a config map; a passphrase is mandatory.
pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<OkxConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, true)?;
    let signer = Arc::new(OkxSigner::new(credentials, config.testnet));

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_URL, REST_URL),
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
    signer: Arc<OkxSigner>,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<OkxConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&OkxRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    let endpoints = OkxEndpoints {
        private_ws_url: config.resolve_ws_url(WS_PRIVATE_MAINNET, WS_PRIVATE_TESTNET),
        public_ws_url: config.resolve_public_ws_url(WS_BUSINESS_MAINNET, WS_BUSINESS_TESTNET),
    };
    Ok(OkxConnector::new(
        rest,
        instrument,
        signer,
        endpoints,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &OkxRest<R>,
    inst_id: &str,
) -> Result<SymbolInfo, ExchangeError> {
    let instrument = rest.get_instrument(inst_id).await?;
    Ok(convert_symbol_info(&instrument))
}
