use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    FixedPlan, RestClient, StreamPlan, StreamSession, StreamSlot, StreamState, WsCodec, WsConfig,
};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::okx::codec::OkxKlineCodec;
use crate::exchanges::okx::conversions::{convert_candle_row, interval_code, EXCHANGE, SYMBOLS};
use crate::exchanges::okx::rest::OkxRest;
use std::sync::Arc;
use tracing::instrument;

/// Candles and funding for OKX swaps. Candle channels live on the business socket.
pub struct MarketData<R: RestClient> {
    rest: OkxRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    klines: StreamSlot<OkxKlineCodec>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: OkxRest::new(rest.clone()),
            instrument,
            ws_url,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let (interval, bar) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let rows = self
            .rest
            .get_candles(&self.instrument.native, bar, limit)
            .await?;

        // OKX answers newest first
        Ok(rows
            .iter()
            .rev()
            .filter_map(|row| convert_candle_row(row, &self.instrument.symbol, interval))
            .collect())
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let funding = self.rest.get_funding_rate(&self.instrument.native).await?;
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: funding.funding_rate,
            next_funding_time: funding.next_funding_time.max(funding.funding_time),
            mark_price: None,
        })
    }

    pub async fn start_kline_stream(
        &self,
        symbols: &[String],
        interval: &str,
        callback: CandleCallback,
    ) -> Result<(), ExchangeError> {
        let (interval, bar) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let inst_ids = symbols
            .iter()
            .map(|symbol| SYMBOLS.to_native(symbol))
            .collect::<Result<Vec<_>, _>>()?;
        if inst_ids.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let codec = OkxKlineCodec::new(interval, bar);
        let plan = StreamPlan::subscribe(self.ws_url.clone(), vec![codec.encode_subscription(&inst_ids)?]);
        let session = StreamSession::new(
            format!("okx/klines/{}", interval),
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
