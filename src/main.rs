use anyhow::Context;
use omnigate::core::config::ExchangeConfig;
use omnigate::{AdapterRegistry, ExchangeKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Read-only smoke run: `omnigate <exchange> [symbol]`.
///
/// Credentials come from `<EXCHANGE>_API_KEY`, `<EXCHANGE>_SECRET_KEY` and
/// friends, optionally loaded from `.env`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let kind: ExchangeKind = args
        .next()
        .context("usage: omnigate <exchange> [symbol]")?
        .parse()?;
    let symbol = args.next().unwrap_or_else(|| "BTCUSDT".to_string());

    #[cfg(feature = "env-file")]
    if let Err(e) = dotenv::dotenv() {
        warn!(error = %e, "No .env file loaded");
    }
    let config = ExchangeConfig::map_from_env(kind.as_str())
        .with_context(|| format!("missing credentials for {}", kind))?;

    let adapter = AdapterRegistry::create(kind, &config, &symbol).await?;
    info!(
        exchange = adapter.name(),
        symbol = adapter.symbol(),
        base = adapter.base_asset(),
        quote = adapter.quote_asset(),
        "Connected"
    );

    match adapter.get_funding_rate().await {
        Ok(funding) => info!(rate = %funding.rate, next = funding.next_funding_time, "Funding"),
        Err(e) => warn!(error = %e, "Funding rate unavailable"),
    }

    let candles = adapter.get_historical_klines("1m", 5).await?;
    for candle in &candles {
        info!(
            time = candle.timestamp,
            open = %candle.open,
            close = %candle.close,
            closed = candle.is_closed,
            "Candle"
        );
    }

    let account = adapter.get_account().await?;
    info!(
        wallet = %account.total_wallet_balance,
        available = %account.available_balance,
        positions = account.positions.len(),
        "Account"
    );
    Ok(())
}
