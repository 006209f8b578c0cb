use crate::core::errors::ExchangeError;
use crate::core::kernel::StreamState;
use crate::core::types::{
    Account, Balance, BatchCancelResult, BatchPlaceResult, Candle, FundingRate, Order,
    OrderRequest, Position, StreamUpdate, SymbolInfo,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Receives normalized order, position and balance updates.
pub type UpdateCallback = Arc<dyn Fn(StreamUpdate) + Send + Sync>;

/// Receives candles, provisional and closed.
pub type CandleCallback = Arc<dyn Fn(Candle) + Send + Sync>;

/// Wrap an order-only handler as an [`UpdateCallback`].
pub fn orders_only<F>(handler: F) -> UpdateCallback
where
    F: Fn(Order) + Send + Sync + 'static,
{
    Arc::new(move |update| {
        if let StreamUpdate::Order(order) = update {
            handler(order);
        }
    })
}

/// The canonical trading contract every exchange adapter implements.
///
/// An adapter is bound to one symbol at construction; order operations,
/// positions and order streams are scoped to it. Every call except the
/// symbol metadata accessors goes to the exchange.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange name as used by the registry, e.g. `"okx"`.
    fn name(&self) -> &'static str;

    /// Generic symbol the adapter trades (`BTCUSDT`).
    fn symbol(&self) -> &str;

    fn symbol_info(&self) -> &SymbolInfo;

    async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError>;

    /// Place several orders; failures are collected, never fatal.
    async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult;

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError>;

    /// Cancel several orders; ids the exchange no longer knows count as resolved.
    async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult;

    /// List open orders, then batch-cancel them.
    ///
    /// Not atomic: orders placed between the listing and the cancel calls
    /// survive this invocation.
    async fn cancel_all_orders(&self) -> Result<BatchCancelResult, ExchangeError> {
        let ids: Vec<String> = self
            .get_open_orders()
            .await?
            .into_iter()
            .map(|order| order.order_id)
            .collect();

        if ids.is_empty() {
            return Ok(BatchCancelResult::default());
        }
        Ok(self.batch_cancel_orders(&ids).await)
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError>;

    async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError>;

    async fn get_account(&self) -> Result<Account, ExchangeError>;

    async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError>;

    /// Balance of the symbol's quote (margin) asset.
    async fn get_balance(&self) -> Result<Balance, ExchangeError>;

    async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError>;

    async fn stop_order_stream(&self) -> Result<(), ExchangeError>;

    /// Subscribe to candles of one or more generic symbols.
    ///
    /// Unrecognized intervals resolve to one minute.
    async fn start_kline_stream(
        &self,
        symbols: &[String],
        interval: &str,
        callback: CandleCallback,
    ) -> Result<(), ExchangeError>;

    async fn stop_kline_stream(&self) -> Result<(), ExchangeError>;

    /// Most recent `limit` candles of the adapter's symbol, oldest first.
    async fn get_historical_klines(
        &self,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn get_funding_rate(&self) -> Result<FundingRate, ExchangeError>;

    fn order_stream_state(&self) -> StreamState;

    fn kline_stream_state(&self) -> StreamState;

    fn price_decimals(&self) -> u32 {
        self.symbol_info().price_decimals
    }

    fn quantity_decimals(&self) -> u32 {
        self.symbol_info().quantity_decimals
    }

    fn base_asset(&self) -> &str {
        &self.symbol_info().base_asset
    }

    fn quote_asset(&self) -> &str {
        &self.symbol_info().quote_asset
    }
}
