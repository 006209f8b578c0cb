use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    FixedPlan, RestClient, StreamPlan, StreamSession, StreamSlot, StreamState, WsCodec, WsConfig,
};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::bingx::codec::BingxKlineCodec;
use crate::exchanges::bingx::conversions::{convert_kline, interval_code, EXCHANGE, SYMBOLS};
use crate::exchanges::bingx::rest::BingxRest;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

pub struct MarketData<R: RestClient> {
    rest: BingxRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    klines: StreamSlot<BingxKlineCodec>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: BingxRest::new(rest.clone()),
            instrument,
            ws_url,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
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
        let span = interval.minutes() * 60_000;
        Ok(rows
            .iter()
            .map(|row| {
                let mut candle = convert_kline(row, &self.instrument.symbol, interval);
                candle.is_closed = candle.timestamp + span <= now;
                candle
            })
            .collect())
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let index = self.rest.get_premium_index(&self.instrument.native).await?;
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: index.last_funding_rate,
            next_funding_time: index.next_funding_time,
            mark_price: (index.mark_price > Decimal::ZERO).then_some(index.mark_price),
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
        let data_types = symbols
            .iter()
            .map(|symbol| SYMBOLS.to_native(symbol).map(|n| BingxKlineCodec::data_type(&n, code)))
            .collect::<Result<Vec<_>, _>>()?;
        if data_types.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let codec = BingxKlineCodec::new(interval);
        let frames = data_types
            .iter()
            .map(|data_type| codec.encode_subscription(std::slice::from_ref(data_type)))
            .collect::<Result<Vec<_>, _>>()?;
        let session = StreamSession::new(
            format!("bingx/klines/{}", interval),
            codec,
            Arc::new(FixedPlan(StreamPlan::subscribe(self.ws_url.clone(), frames))),
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
