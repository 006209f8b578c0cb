use crate::core::batch::{fail_chunk, fail_place_chunk};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderStatus, OrderType};
use crate::exchanges::bitget::conversions::{convert_order, side_to_bitget, PRODUCT_TYPE};
use crate::exchanges::bitget::rest::{classify_error, BitgetRest};
use crate::exchanges::bitget::types::{BitgetBatchResult, BitgetOrderAck};
use crate::utils::client_id::ClientOrderIdGenerator;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

const BATCH_CHUNK: usize = 50;
const CLIENT_ID_MAX_LEN: usize = 40;

/// Order placement and cancellation on Bitget USDT-M futures.
pub struct Trading<R: RestClient> {
    rest: BitgetRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: BitgetRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    fn margin_coin(&self) -> &str {
        &self.instrument.info.quote_asset
    }

    /// Fields shared by single and batch placement.
    fn common(&self) -> Value {
        json!({
            "symbol": self.instrument.native,
            "productType": PRODUCT_TYPE,
            "marginMode": "crossed",
            "marginCoin": self.margin_coin(),
        })
    }

    /// Per-order fields; quantities are in base units.
    fn order_fields(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;
        let mut order = json!({
            "size": info.format_quantity(request.quantity),
            "side": side_to_bitget(request.side),
            "clientOid": self.ids.resolve(request.client_order_id.as_deref()),
        });
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                order["orderType"] = json!("limit");
                order["price"] = json!(info.format_price(price));
                order["force"] = json!(if request.post_only { "post_only" } else { "gtc" });
            }
            _ => order["orderType"] = json!("market"),
        }
        if request.reduce_only {
            order["reduceOnly"] = json!("YES");
        }
        Ok(order)
    }

    fn acknowledged(&self, ack: &BitgetOrderAck, request: &OrderRequest) -> Order {
        let now = chrono::Utc::now().timestamp_millis();
        Order {
            order_id: ack.order_id.clone(),
            client_order_id: ack.client_oid.clone(),
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

    #[instrument(skip(self, request), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let mut body = self.common();
        if let (Some(target), Value::Object(fields)) = (body.as_object_mut(), self.order_fields(request)?) {
            target.extend(fields);
        }
        let ack = self.rest.place_order(&body).await?;
        Ok(self.acknowledged(&ack, request))
    }

    /// Bitget reports successes and failures in separate lists keyed by client id.
    fn record_batch(
        &self,
        result: &mut BatchPlaceResult,
        batch: BitgetBatchResult,
        pending: Vec<(usize, String)>,
        requests: &[OrderRequest],
    ) {
        let successes: HashMap<&str, &BitgetOrderAck> = batch
            .success_list
            .iter()
            .map(|ack| (ack.client_oid.as_str(), ack))
            .collect();
        let failures: HashMap<&str, _> = batch
            .failure_list
            .iter()
            .map(|failure| (failure.client_oid.as_str(), failure))
            .collect();

        for (index, client_oid) in pending {
            let outcome = if let Some(ack) = successes.get(client_oid.as_str()) {
                Ok(self.acknowledged(ack, &requests[index]))
            } else if let Some(failure) = failures.get(client_oid.as_str()) {
                Err(classify_error(&failure.error_code, &failure.error_msg))
            } else {
                Err(ExchangeError::Other(format!(
                    "order {} missing from batch response",
                    client_oid
                )))
            };
            result.record(index, outcome);
        }
    }

    #[instrument(skip(self, requests), fields(exchange = "bitget", count = requests.len()))]
    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();

        for (chunk_index, chunk) in requests.chunks(BATCH_CHUNK).enumerate() {
            let offset = chunk_index * BATCH_CHUNK;
            let mut orders = Vec::with_capacity(chunk.len());
            let mut pending = Vec::with_capacity(chunk.len());
            for (i, request) in chunk.iter().enumerate() {
                match self.order_fields(request) {
                    Ok(order) => {
                        let client_oid = order["clientOid"].as_str().unwrap_or_default().to_string();
                        pending.push((offset + i, client_oid));
                        orders.push(order);
                    }
                    Err(e) => result.record(offset + i, Err(e)),
                }
            }
            if orders.is_empty() {
                continue;
            }

            match self.rest.place_batch(self.common(), &orders).await {
                Ok(batch) => self.record_batch(&mut result, batch, pending, requests),
                Err(e) => {
                    warn!(exchange = "bitget", error = %e, "Batch placement chunk failed");
                    fail_place_chunk(&mut result, pending.into_iter().map(|(i, _)| i), &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.rest
            .cancel_order(&self.instrument.native, order_id)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, order_ids), fields(exchange = "bitget", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(BATCH_CHUNK) {
            match self.rest.cancel_batch(&self.instrument.native, chunk).await {
                Ok(batch) => {
                    for id in chunk {
                        let outcome = if batch.success_list.iter().any(|ack| &ack.order_id == id) {
                            Ok(())
                        } else if let Some(failure) =
                            batch.failure_list.iter().find(|f| &f.order_id == id)
                        {
                            Err(classify_error(&failure.error_code, &failure.error_msg))
                        } else {
                            Err(ExchangeError::Other(format!(
                                "order {} missing from batch response",
                                id
                            )))
                        };
                        result.record(id.clone(), outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "bitget", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(&self.instrument.native, order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        let orders = self.rest.get_pending_orders(&self.instrument.native).await?;
        Ok(orders
            .iter()
            .map(|order| convert_order(order, &self.instrument))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::Auth;
    use crate::core::types::OrderSide;
    use crate::exchanges::bitget::conversions::SYMBOLS;
    use async_trait::async_trait;
    use reqwest::Method;
    use std::sync::Mutex;

    /// Batch place double: the first call drops the connection, later calls
    /// accept every order and reject the ones whose size is "0.5".
    #[derive(Clone, Default)]
    struct PlaceDouble {
        calls: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl RestClient for PlaceDouble {
        async fn request(
            &self,
            _method: Method,
            _endpoint: &str,
            _query: &[(&str, &str)],
            body: &[u8],
            _auth: Auth,
        ) -> Result<Value, ExchangeError> {
            let body: Value = serde_json::from_slice(body).unwrap();
            let orders = body["orderList"].as_array().cloned().unwrap_or_default();
            let first = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(orders.len());
                calls.len() == 1
            };
            if first {
                return Err(ExchangeError::NetworkError("connection reset".to_string()));
            }

            let mut success = Vec::new();
            let mut failure = Vec::new();
            for (i, order) in orders.iter().enumerate() {
                let client_oid = order["clientOid"].clone();
                if order["size"] == "0.5" {
                    failure.push(json!({"clientOid": client_oid, "errorCode": "40762", "errorMsg": "The order amount exceeds the balance"}));
                } else {
                    success.push(json!({"orderId": format!("9{}", i), "clientOid": client_oid}));
                }
            }
            Ok(json!({"code": "00000", "msg": "success", "data": {"successList": success, "failureList": failure}}))
        }
    }

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_failed_chunk_fails_only_its_own_orders() {
        let rest = PlaceDouble::default();
        let instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        let trading = Trading::new(&rest, Arc::new(instrument), None);

        let mut requests: Vec<OrderRequest> = (0..BATCH_CHUNK + 3)
            .map(|_| OrderRequest::limit(OrderSide::Buy, d("0.01"), d("27000")))
            .collect();
        requests[BATCH_CHUNK + 1] = OrderRequest::limit(OrderSide::Buy, d("0.5"), d("27000"));
        requests[BATCH_CHUNK + 2] = OrderRequest::market(OrderSide::Buy, Decimal::ZERO);

        let result = trading.batch_place_orders(&requests).await;

        assert_eq!(*rest.calls.lock().unwrap(), vec![BATCH_CHUNK, 2]);
        assert_eq!(result.placed.len(), 1);
        assert!(result.margin_insufficient);

        let mut failed: Vec<usize> = result.failed.iter().map(|(i, _)| *i).collect();
        failed.sort_unstable();
        let mut expected: Vec<usize> = (0..BATCH_CHUNK).collect();
        expected.extend([BATCH_CHUNK + 1, BATCH_CHUNK + 2]);
        assert_eq!(failed, expected);
        assert!(result
            .failed
            .iter()
            .filter(|(i, _)| *i < BATCH_CHUNK)
            .all(|(_, e)| e.to_string().contains("connection reset")));
    }
}
