use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    FixedPlan, RestClient, StreamPlan, StreamSession, StreamSlot, StreamState, WsCodec, WsConfig,
};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::gate::codec::GateKlineCodec;
use crate::exchanges::gate::conversions::{convert_candle, interval_code, EXCHANGE, SYMBOLS};
use crate::exchanges::gate::rest::GateRest;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

pub struct MarketData<R: RestClient> {
    rest: GateRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    klines: StreamSlot<GateKlineCodec>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: GateRest::new(rest.clone()),
            instrument,
            ws_url,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let (interval, code) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let rows = self
            .rest
            .get_candles(&self.instrument.native, code, limit)
            .await?;

        let now = chrono::Utc::now().timestamp_millis();
        let span = interval.minutes() * 60_000;
        Ok(rows
            .iter()
            .map(|row| {
                let mut candle = convert_candle(row, &self.instrument.symbol, interval, &self.instrument.info);
                candle.is_closed = candle.timestamp + span <= now;
                candle
            })
            .collect())
    }

    /// Funding data lives on the contract itself.
    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let contract = self.rest.get_contract(&self.instrument.native).await?;
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: contract.funding_rate,
            next_funding_time: contract.funding_next_apply * 1000,
            mark_price: (contract.mark_price > Decimal::ZERO).then_some(contract.mark_price),
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
        let contracts = symbols
            .iter()
            .map(|symbol| SYMBOLS.to_native(symbol))
            .collect::<Result<Vec<_>, _>>()?;
        if contracts.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let codec = GateKlineCodec::new(interval, code, Arc::clone(&self.instrument));
        let frames = contracts
            .iter()
            .map(|contract| codec.encode_subscription(std::slice::from_ref(contract)))
            .collect::<Result<Vec<_>, _>>()?;
        let session = StreamSession::new(
            format!("gate/klines/{}", interval),
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
