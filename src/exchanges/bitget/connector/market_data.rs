use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    FixedPlan, RestClient, StreamPlan, StreamSession, StreamSlot, StreamState, WsCodec, WsConfig,
};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::bitget::codec::BitgetKlineCodec;
use crate::exchanges::bitget::conversions::{convert_candle_row, interval_code, EXCHANGE, SYMBOLS};
use crate::exchanges::bitget::rest::BitgetRest;
use std::sync::Arc;
use tracing::instrument;

pub struct MarketData<R: RestClient> {
    rest: BitgetRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    klines: StreamSlot<BitgetKlineCodec>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: BitgetRest::new(rest.clone()),
            instrument,
            ws_url,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let (interval, granularity) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let rows = self
            .rest
            .get_candles(&self.instrument.native, granularity, limit)
            .await?;

        // Rows carry no finality flag; a bucket is closed once its span has elapsed
        let now = chrono::Utc::now().timestamp_millis();
        let span = i64::from(interval.minutes()) * 60_000;
        Ok(rows
            .iter()
            .filter_map(|row| convert_candle_row(row, &self.instrument.symbol, interval))
            .map(|mut candle| {
                candle.is_closed = candle.timestamp + span <= now;
                candle
            })
            .collect())
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let funding = self.rest.get_funding_rate(&self.instrument.native).await?;
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: funding.funding_rate,
            next_funding_time: funding.next_update,
            mark_price: None,
        })
    }

    pub async fn start_kline_stream(
        &self,
        symbols: &[String],
        interval: &str,
        callback: CandleCallback,
    ) -> Result<(), ExchangeError> {
        let (interval, granularity) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let natives = symbols
            .iter()
            .map(|symbol| SYMBOLS.to_native(symbol))
            .collect::<Result<Vec<_>, _>>()?;
        if natives.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let codec = BitgetKlineCodec::new(interval, granularity);
        let plan = StreamPlan::subscribe(self.ws_url.clone(), vec![codec.encode_subscription(&natives)?]);
        let session = StreamSession::new(
            format!("bitget/klines/{}", interval),
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
