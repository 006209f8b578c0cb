use crate::core::batch::{fail_chunk, fail_place_chunk};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderStatus, OrderType};
use crate::exchanges::bybit::conversions::{convert_order, side_to_bybit};
use crate::exchanges::bybit::rest::{BybitRest, CATEGORY};
use crate::exchanges::bybit::types::BybitOrderAck;
use crate::utils::client_id::ClientOrderIdGenerator;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

const PLACE_CHUNK: usize = 10;
const CANCEL_CHUNK: usize = 20;
const CLIENT_ID_MAX_LEN: usize = 36;

/// Order placement and cancellation on Bybit linear perpetuals.
pub struct Trading<R: RestClient> {
    rest: BybitRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: BybitRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    /// Batch items omit `category`, which the batch envelope carries.
    fn order_item(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;

        let mut item = json!({
            "symbol": self.instrument.native,
            "side": side_to_bybit(request.side),
            "qty": info.format_quantity(request.quantity),
            "orderLinkId": self.ids.resolve(request.client_order_id.as_deref()),
        });
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                item["orderType"] = json!("Limit");
                item["price"] = json!(info.format_price(price));
                item["timeInForce"] = json!(if request.post_only { "PostOnly" } else { "GTC" });
            }
            _ => item["orderType"] = json!("Market"),
        }
        if request.reduce_only {
            item["reduceOnly"] = json!(true);
        }
        Ok(item)
    }

    fn acknowledged(&self, ack: &BybitOrderAck, request: &OrderRequest) -> Order {
        let now = chrono::Utc::now().timestamp_millis();
        Order {
            order_id: ack.order_id.clone(),
            client_order_id: ack.order_link_id.clone(),
            symbol: self.instrument.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            price: request.price.unwrap_or(Decimal::ZERO),
            quantity: request.quantity,
            executed_quantity: Decimal::ZERO,
            average_price: Decimal::ZERO,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    #[instrument(skip(self, request), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let mut body = self.order_item(request)?;
        body["category"] = json!(CATEGORY);
        let ack = self.rest.place_order(&body).await?;
        Ok(self.acknowledged(&ack, request))
    }

    #[instrument(skip(self, requests), fields(exchange = "bybit", count = requests.len()))]
    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();

        for (chunk_index, chunk) in requests.chunks(PLACE_CHUNK).enumerate() {
            let offset = chunk_index * PLACE_CHUNK;
            let mut items = Vec::with_capacity(chunk.len());
            let mut indices = Vec::with_capacity(chunk.len());
            for (i, request) in chunk.iter().enumerate() {
                match self.order_item(request) {
                    Ok(item) => {
                        items.push(item);
                        indices.push(offset + i);
                    }
                    Err(e) => result.record(offset + i, Err(e)),
                }
            }
            if items.is_empty() {
                continue;
            }

            match self.rest.place_batch(&items).await {
                Ok(acks) => {
                    for (index, ack) in indices.into_iter().zip(acks) {
                        let outcome = ack.map(|ack| self.acknowledged(&ack, &requests[index]));
                        result.record(index, outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "bybit", error = %e, "Batch placement chunk failed");
                    fail_place_chunk(&mut result, indices, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.rest
            .cancel_order(&self.instrument.native, order_id)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, order_ids), fields(exchange = "bybit", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(CANCEL_CHUNK) {
            match self.rest.cancel_batch(&self.instrument.native, chunk).await {
                Ok(acks) => {
                    for (id, ack) in chunk.iter().zip(acks) {
                        result.record(id.clone(), ack.map(|_| ()));
                    }
                }
                Err(e) => {
                    warn!(exchange = "bybit", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(&self.instrument.native, order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
    pub async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        let orders = self.rest.get_open_orders(&self.instrument.native).await?;
        Ok(orders
            .iter()
            .map(|order| convert_order(order, &self.instrument))
            .collect())
    }
}
