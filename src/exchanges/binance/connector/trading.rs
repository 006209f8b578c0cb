use crate::core::batch::{fail_chunk, fail_place_chunk};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderType};
use crate::exchanges::binance::conversions::{convert_order, side_to_binance};
use crate::exchanges::binance::rest::{classify_error, BinanceRest};
use crate::exchanges::binance::types::BinanceBatchItem;
use crate::utils::client_id::ClientOrderIdGenerator;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

const PLACE_CHUNK: usize = 5;
const CANCEL_CHUNK: usize = 10;
const CLIENT_ID_MAX_LEN: usize = 36;

/// Order placement and cancellation on Binance USD-M futures.
pub struct Trading<R: RestClient> {
    rest: BinanceRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: BinanceRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    fn order_params(&self, request: &OrderRequest) -> Result<Vec<(&'static str, String)>, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;

        let mut params = vec![
            ("symbol", self.instrument.native.clone()),
            ("side", side_to_binance(request.side).to_string()),
            ("quantity", info.format_quantity(request.quantity)),
            (
                "newClientOrderId",
                self.ids.resolve(request.client_order_id.as_deref()),
            ),
        ];
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                params.push(("type", "LIMIT".to_string()));
                params.push(("price", info.format_price(price)));
                // GTX is Binance's post-only time in force
                let tif = if request.post_only { "GTX" } else { "GTC" };
                params.push(("timeInForce", tif.to_string()));
            }
            _ => params.push(("type", "MARKET".to_string())),
        }
        if request.reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }
        Ok(params)
    }

    fn batch_item(&self, item: BinanceBatchItem) -> Result<Order, ExchangeError> {
        match item {
            BinanceBatchItem::Order(order) => Ok(convert_order(&order, &self.instrument)),
            BinanceBatchItem::Error(e) => Err(classify_error(e.code, &e.msg)),
        }
    }

    #[instrument(skip(self, request), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let params = self.order_params(request)?;
        let borrowed: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let order = self.rest.place_order(&borrowed).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self, requests), fields(exchange = "binance", count = requests.len()))]
    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();

        for (chunk_index, chunk) in requests.chunks(PLACE_CHUNK).enumerate() {
            let offset = chunk_index * PLACE_CHUNK;
            let mut orders = Vec::with_capacity(chunk.len());
            let mut indices = Vec::with_capacity(chunk.len());
            for (i, request) in chunk.iter().enumerate() {
                match self.order_params(request) {
                    Ok(params) => {
                        let object: Map<String, Value> = params
                            .into_iter()
                            .map(|(k, v)| (k.to_string(), Value::String(v)))
                            .collect();
                        orders.push(Value::Object(object));
                        indices.push(offset + i);
                    }
                    Err(e) => result.record(offset + i, Err(e)),
                }
            }
            if orders.is_empty() {
                continue;
            }

            match self.rest.place_batch(&orders).await {
                Ok(items) => {
                    for (index, item) in indices.into_iter().zip(items) {
                        result.record(index, self.batch_item(item));
                    }
                }
                Err(e) => {
                    warn!(exchange = "binance", error = %e, "Batch placement chunk failed");
                    fail_place_chunk(&mut result, indices, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.rest
            .cancel_order(&self.instrument.native, order_id)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, order_ids), fields(exchange = "binance", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(CANCEL_CHUNK) {
            match self.rest.cancel_batch(&self.instrument.native, chunk).await {
                Ok(items) => {
                    for (id, item) in chunk.iter().zip(items) {
                        let outcome = match item {
                            BinanceBatchItem::Order(_) => Ok(()),
                            BinanceBatchItem::Error(e) => Err(classify_error(e.code, &e.msg)),
                        };
                        result.record(id.clone(), outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "binance", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(&self.instrument.native, order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        let orders = self.rest.get_open_orders(&self.instrument.native).await?;
        Ok(orders
            .iter()
            .map(|order| convert_order(order, &self.instrument))
            .collect())
    }
}
