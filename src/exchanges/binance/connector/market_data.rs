use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    FixedPlan, RestClient, StreamPlan, StreamSession, StreamSlot, StreamState, WsCodec, WsConfig,
};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::binance::codec::BinanceKlineCodec;
use crate::exchanges::binance::conversions::{convert_kline_row, interval_code, EXCHANGE, SYMBOLS};
use crate::exchanges::binance::rest::BinanceRest;
use std::sync::Arc;
use tracing::instrument;

/// Candles and funding for Binance USD-M futures.
pub struct MarketData<R: RestClient> {
    rest: BinanceRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    klines: StreamSlot<BinanceKlineCodec>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: BinanceRest::new(rest.clone()),
            instrument,
            ws_url,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let (interval, code) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let rows = self
            .rest
            .get_klines(&self.instrument.native, code, limit)
            .await?;

        let now = chrono::Utc::now().timestamp_millis();
        Ok(rows
            .iter()
            .filter_map(|row| convert_kline_row(row, &self.instrument.symbol, interval, now))
            .collect())
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let index = self.rest.get_premium_index(&self.instrument.native).await?;
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: index.last_funding_rate,
            next_funding_time: index.next_funding_time,
            mark_price: Some(index.mark_price),
        })
    }

    pub async fn start_kline_stream(
        &self,
        symbols: &[String],
        interval: &str,
        callback: CandleCallback,
    ) -> Result<(), ExchangeError> {
        let (interval, code) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let streams = symbols
            .iter()
            .map(|symbol| {
                SYMBOLS
                    .to_native(symbol)
                    .map(|native| BinanceKlineCodec::stream_name(&native, code))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if streams.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let codec = BinanceKlineCodec::new(interval);
        let plan = StreamPlan::subscribe(self.ws_url.clone(), vec![codec.encode_subscription(&streams)?]);
        let session = StreamSession::new(
            format!("binance/klines/{}", interval),
            codec,
            Arc::new(FixedPlan(plan)),
            WsConfig::default(),
        );
        self.klines.start(session, callback).await
    }

    pub async fn stop_kline_stream(&self) -> Result<(), ExchangeError> {
        self.klines.stop().await
    }

    pub fn kline_stream_state(&self) -> StreamState {
        self.klines.state()
    }
}
