use crate::core::batch::{fail_chunk, fail_place_chunk};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderType};
use crate::exchanges::gate::conversions::{convert_order, signed_size};
use crate::exchanges::gate::rest::{classify_error, GateRest};
use crate::utils::client_id::ClientOrderIdGenerator;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

const PLACE_CHUNK: usize = 10;
const CANCEL_CHUNK: usize = 20;
/// Gate's `text` field: `t-` plus at most 28 characters.
const CLIENT_ID_MAX_LEN: usize = 30;
const CLIENT_ID_PREFIX: &str = "t-";

pub struct Trading<R: RestClient> {
    rest: GateRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: GateRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN)
                .with_required_prefix(CLIENT_ID_PREFIX)
                .with_broker_prefix(broker_prefix),
        }
    }

    /// Caller ids get the mandatory prefix if they lack it.
    fn client_id(&self, requested: Option<&str>) -> String {
        let mut id = self.ids.resolve(requested);
        if !id.starts_with(CLIENT_ID_PREFIX) {
            id = format!("{}{}", CLIENT_ID_PREFIX, id);
        }
        id.truncate(CLIENT_ID_MAX_LEN);
        id
    }

    /// Contract count signed by side; market orders are IOC at price 0.
    fn order_body(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;
        let contracts = info.to_contracts(request.quantity)?;
        let size = signed_size(request.side, contracts).to_i64().ok_or_else(|| {
            ExchangeError::InvalidParameters(format!("contract count {} out of range", contracts))
        })?;

        let mut body = json!({
            "contract": self.instrument.native,
            "size": size,
            "text": self.client_id(request.client_order_id.as_deref()),
        });
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                body["price"] = json!(info.format_price(price));
                body["tif"] = json!(if request.post_only { "poc" } else { "gtc" });
            }
            _ => {
                body["price"] = json!("0");
                body["tif"] = json!("ioc");
            }
        }
        if request.reduce_only {
            body["reduce_only"] = json!(true);
        }
        Ok(body)
    }

    #[instrument(skip(self, request), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let body = self.order_body(request)?;
        let order = self.rest.place_order(&body).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self, requests), fields(exchange = "gate", count = requests.len()))]
    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();

        for (chunk_index, chunk) in requests.chunks(PLACE_CHUNK).enumerate() {
            let offset = chunk_index * PLACE_CHUNK;
            let mut bodies = Vec::with_capacity(chunk.len());
            let mut indices = Vec::with_capacity(chunk.len());
            for (i, request) in chunk.iter().enumerate() {
                match self.order_body(request) {
                    Ok(body) => {
                        bodies.push(body);
                        indices.push(offset + i);
                    }
                    Err(e) => result.record(offset + i, Err(e)),
                }
            }
            if bodies.is_empty() {
                continue;
            }

            match self.rest.place_batch(&bodies).await {
                Ok(outcomes) => {
                    let mut outcomes = outcomes.into_iter();
                    for index in indices {
                        let outcome = match outcomes.next() {
                            Some(outcome) => outcome.map(|o| convert_order(&o, &self.instrument)),
                            None => Err(ExchangeError::Other(
                                "order missing from batch response".to_string(),
                            )),
                        };
                        result.record(index, outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "gate", error = %e, "Batch placement chunk failed");
                    fail_place_chunk(&mut result, indices, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.rest.cancel_order(order_id).await.map(|_| ())
    }

    #[instrument(skip(self, order_ids), fields(exchange = "gate", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(CANCEL_CHUNK) {
            match self.rest.cancel_batch(chunk).await {
                Ok(items) => {
                    for id in chunk {
                        let outcome = match items.iter().find(|item| &item.id == id) {
                            Some(item) if item.succeeded => Ok(()),
                            // Failed items carry the error label in `message`
                            Some(item) => Err(classify_error(&item.message, &item.message)),
                            None => Err(ExchangeError::Other(format!(
                                "order {} missing from batch response",
                                id
                            ))),
                        };
                        result.record(id.clone(), outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "gate", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        let orders = self.rest.get_open_orders(&self.instrument.native).await?;
        Ok(orders
            .iter()
            .map(|order| convert_order(order, &self.instrument))
            .collect())
    }
}
