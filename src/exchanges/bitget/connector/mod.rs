use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, StreamState};
use crate::core::symbols::Instrument;
use crate::core::traits::{CandleCallback, ExchangeAdapter, UpdateCallback};
use crate::core::types::{
    Account as AccountSnapshot, Balance, BatchCancelResult, BatchPlaceResult, Candle, FundingRate,
    Order, OrderRequest, Position, SymbolInfo,
};
use crate::exchanges::bitget::signer::BitgetSigner;
use async_trait::async_trait;
use std::sync::Arc;

pub mod account;
pub mod market_data;
pub mod trading;

pub use account::Account;
pub use market_data::MarketData;
pub use trading::Trading;

/// URLs a connector needs beyond the REST base.
#[derive(Debug, Clone)]
pub struct BitgetEndpoints {
    /// Private socket for orders, positions and account.
    pub private_ws_url: String,
    /// Public socket for candle channels.
    pub public_ws_url: String,
}

/// Bitget USDT-M futures adapter.
pub struct BitgetConnector<R: RestClient> {
    pub trading: Trading<R>,
    pub account: Account<R>,
    pub market: MarketData<R>,
    instrument: Arc<Instrument>,
}

impl<R: RestClient + Clone + 'static> BitgetConnector<R> {
    pub fn new(
        rest: R,
        instrument: Instrument,
        signer: Arc<BitgetSigner>,
        endpoints: BitgetEndpoints,
        broker_prefix: Option<&str>,
    ) -> Self {
        let instrument = Arc::new(instrument);
        Self {
            trading: Trading::new(&rest, Arc::clone(&instrument), broker_prefix),
            account: Account::new(
                &rest,
                Arc::clone(&instrument),
                signer,
                endpoints.private_ws_url,
            ),
            market: MarketData::new(&rest, Arc::clone(&instrument), endpoints.public_ws_url),
            instrument,
        }
    }
}

#[async_trait]
impl<R: RestClient + Clone + 'static> ExchangeAdapter for BitgetConnector<R> {
    fn name(&self) -> &'static str {
        "bitget"
    }

    fn symbol(&self) -> &str {
        &self.instrument.symbol
    }

    fn symbol_info(&self) -> &SymbolInfo {
        &self.instrument.info
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        self.trading.place_order(request).await
    }

    async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        self.trading.batch_place_orders(requests).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.trading.cancel_order(order_id).await
    }

    async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        self.trading.batch_cancel_orders(order_ids).await
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        self.trading.get_order(order_id).await
    }

    async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        self.trading.get_open_orders().await
    }

    async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        self.account.get_account().await
    }

    async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        self.account.get_positions().await
    }

    async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        self.account.get_balance().await
    }

    async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        self.account.start_order_stream(callback).await
    }

    async fn stop_order_stream(&self) -> Result<(), ExchangeError> {
        self.account.stop_order_stream().await
    }

    async fn start_kline_stream(
        &self,
        symbols: &[String],
        interval: &str,
        callback: CandleCallback,
    ) -> Result<(), ExchangeError> {
        self.market
            .start_kline_stream(symbols, interval, callback)
            .await
    }

    async fn stop_kline_stream(&self) -> Result<(), ExchangeError> {
        self.market.stop_kline_stream().await
    }

    async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.market.get_historical_klines(interval, limit).await
    }

    async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError> {
        self.market.get_funding_rate().await
    }

    fn order_stream_state(&self) -> StreamState {
        self.account.order_stream_state()
    }

    fn kline_stream_state(&self) -> StreamState {
        self.market.kline_stream_state()
    }
}
