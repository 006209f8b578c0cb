use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
use crate::core::symbols::Instrument;
use crate::core::types::SymbolInfo;
use crate::exchanges::kucoin::connector::KucoinConnector;
use crate::exchanges::kucoin::conversions::{convert_symbol_info, EXCHANGE, SYMBOLS};
use crate::exchanges::kucoin::rest::KucoinRest;
use crate::exchanges::kucoin::signer::KucoinSigner;
use std::collections::HashMap;
use std::sync::Arc;

pub const REST_MAINNET: &str = "https://api-futures.kucoin.com";
pub const REST_TESTNET: &str = "https://api-sandbox-futures.kucoin.com";

pub async fn build_adapter(
    config: &HashMap<String, String>,
    symbol: &str,
) -> Result<KucoinConnector<ReqwestRest>, ExchangeError> {
    let config = ExchangeConfig::from_map(config);
    let credentials = config.credentials(EXCHANGE, true)?;
    let signer = Arc::new(KucoinSigner::new(credentials)?);

    let rest_config = RestClientConfig::new(
        config.resolve_base_url(REST_MAINNET, REST_TESTNET),
        EXCHANGE.to_string(),
    );
    let rest = RestClientBuilder::new(rest_config)
        .with_signer(signer)
        .build()?;

    build_connector(rest, &config, symbol).await
}

/// Socket URLs are handed out per connection by the token endpoints,
/// so only the REST side is configured here.
pub async fn build_connector<R: RestClient + Clone + 'static>(
    rest: R,
    config: &ExchangeConfig,
    symbol: &str,
) -> Result<KucoinConnector<R>, ExchangeError> {
    let instrument = Instrument::resolve(&SYMBOLS, symbol)?;
    let fetched = load_symbol_info(&KucoinRest::new(rest.clone()), &instrument.native).await;
    let instrument = instrument.with_fetched_info(EXCHANGE, fetched);

    Ok(KucoinConnector::new(
        rest,
        instrument,
        config.broker_prefix.as_deref(),
    ))
}

async fn load_symbol_info<R: RestClient>(
    rest: &KucoinRest<R>,
    symbol: &str,
) -> Result<SymbolInfo, ExchangeError> {
    let contract = rest.get_contract(symbol).await?;
    Ok(convert_symbol_info(&contract))
}
