use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    FixedPlan, RestClient, StreamPlan, StreamSession, StreamSlot, StreamState, WsCodec, WsConfig,
};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::mexc::codec::MexcKlineCodec;
use crate::exchanges::mexc::conversions::{convert_klines, interval_code, EXCHANGE, SYMBOLS};
use crate::exchanges::mexc::rest::MexcRest;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct MarketData<R: RestClient> {
    rest: MexcRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    klines: StreamSlot<MexcKlineCodec>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: MexcRest::new(rest.clone()),
            instrument,
            ws_url,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let (interval, code) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let now = chrono::Utc::now().timestamp_millis();
        let span = interval.minutes() * 60_000;
        let klines = self
            .rest
            .get_klines(&self.instrument.native, code, span / 1000, limit, now / 1000)
            .await?;

        let mut candles = convert_klines(&klines, &self.instrument.symbol, interval, &self.instrument.info);
        for candle in &mut candles {
            candle.is_closed = candle.timestamp + span <= now;
        }
        let excess = candles.len().saturating_sub(limit as usize);
        candles.drain(..excess);
        Ok(candles)
    }

    /// Rate and settlement time from the funding endpoint, mark price from
    /// the ticker; a failed ticker leaves the mark price empty.
    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let funding = self.rest.get_funding_rate(&self.instrument.native).await?;
        let mark_price = match self.rest.get_ticker(&self.instrument.native).await {
            Ok(ticker) => (ticker.fair_price > Decimal::ZERO).then_some(ticker.fair_price),
            Err(e) => {
                warn!(exchange = "mexc", error = %e, "Ticker unavailable, funding without mark price");
                None
            }
        };
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: funding.funding_rate,
            next_funding_time: funding.next_settle_time,
            mark_price,
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
        let natives = symbols
            .iter()
            .map(|symbol| SYMBOLS.to_native(symbol))
            .collect::<Result<Vec<_>, _>>()?;
        if natives.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let codec = MexcKlineCodec::new(interval, code, Arc::clone(&self.instrument));
        let frames = natives
            .iter()
            .map(|native| codec.encode_subscription(std::slice::from_ref(native)))
            .collect::<Result<Vec<_>, _>>()?;
        let session = StreamSession::new(
            format!("mexc/klines/{}", interval),
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
