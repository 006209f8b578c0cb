use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, StreamSession, StreamSlot, StreamState, WsConfig};
use crate::core::normalize::resolve_interval;
use crate::core::symbols::{Instrument, SymbolMapper};
use crate::core::traits::CandleCallback;
use crate::core::types::{Candle, FundingRate, KlineInterval};
use crate::exchanges::kucoin::codec::{candle_topic, KucoinKlineCodec};
use crate::exchanges::kucoin::connector::bullet::BulletConnector;
use crate::exchanges::kucoin::connector::PING_INTERVAL;
use crate::exchanges::kucoin::conversions::{convert_kline_row, interval_code, topic_code, EXCHANGE, SYMBOLS};
use crate::exchanges::kucoin::rest::KucoinRest;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

pub struct MarketData<R: RestClient> {
    rest: KucoinRest<R>,
    instrument: Arc<Instrument>,
    klines: StreamSlot<KucoinKlineCodec>,
}

impl<R: RestClient + Clone + 'static> MarketData<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>) -> Self {
        Self {
            rest: KucoinRest::new(rest.clone()),
            instrument,
            klines: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let (interval, granularity) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let now = chrono::Utc::now().timestamp_millis();
        let rows = self
            .rest
            .get_klines(&self.instrument.native, granularity, limit, now)
            .await?;

        let span = interval.minutes() * 60_000;
        let mut candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                convert_kline_row(row, &self.instrument.symbol, interval, &self.instrument.info)
            })
            .map(|mut candle| {
                candle.is_closed = candle.timestamp + span <= now;
                candle
            })
            .collect();
        let excess = candles.len().saturating_sub(limit as usize);
        candles.drain(..excess);
        Ok(candles)
    }

    /// Rate, mark price and countdown come with the contract details.
    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        let contract = self.rest.get_contract(&self.instrument.native).await?;
        let now = chrono::Utc::now().timestamp_millis();
        Ok(FundingRate {
            symbol: self.instrument.symbol.clone(),
            rate: contract.funding_fee_rate,
            next_funding_time: now + contract.next_funding_rate_time,
            mark_price: (contract.mark_price > Decimal::ZERO).then_some(contract.mark_price),
        })
    }

    pub async fn start_kline_stream(
        &self,
        symbols: &[String],
        interval: &str,
        callback: CandleCallback,
    ) -> Result<(), ExchangeError> {
        let (interval, _) =
            resolve_interval(EXCHANGE, KlineInterval::parse_or_default(interval), interval_code);
        let topics = symbols
            .iter()
            .map(|symbol| SYMBOLS.to_native(symbol).map(|n| candle_topic(&n, topic_code(interval))))
            .collect::<Result<Vec<_>, _>>()?;
        if topics.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "kline stream needs at least one symbol".to_string(),
            ));
        }

        let session = StreamSession::new(
            format!("kucoin/klines/{}", interval),
            KucoinKlineCodec::new(interval, Arc::clone(&self.instrument)),
            Arc::new(BulletConnector::new(self.rest.clone(), false, topics)),
            WsConfig::default().with_heartbeat_interval(PING_INTERVAL),
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
