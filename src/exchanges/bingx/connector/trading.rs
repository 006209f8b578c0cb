use crate::core::batch::{fail_chunk, fail_place_chunk};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderType};
use crate::exchanges::bingx::conversions::{convert_order, side_to_bingx};
use crate::exchanges::bingx::rest::{classify_error, BingxRest};
use crate::utils::client_id::ClientOrderIdGenerator;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

const PLACE_CHUNK: usize = 5;
const CANCEL_CHUNK: usize = 10;
const CLIENT_ID_MAX_LEN: usize = 40;

/// One-way mode order parameters, as query pairs or as a batch item.
struct OrderParams {
    pairs: Vec<(&'static str, String)>,
    client_order_id: String,
}

impl OrderParams {
    fn as_query(&self) -> Vec<(&str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    fn as_json(&self) -> Value {
        let mut item = json!({});
        for (key, value) in &self.pairs {
            item[*key] = json!(value);
        }
        item
    }
}

pub struct Trading<R: RestClient> {
    rest: BingxRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: BingxRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    fn order_params(&self, request: &OrderRequest) -> Result<OrderParams, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;
        let client_order_id = self.ids.resolve(request.client_order_id.as_deref());

        let mut pairs = vec![
            ("symbol", self.instrument.native.clone()),
            ("side", side_to_bingx(request.side).to_string()),
            ("positionSide", "BOTH".to_string()),
            ("quantity", info.format_quantity(request.quantity)),
            ("clientOrderID", client_order_id.clone()),
        ];
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                pairs.push(("type", "LIMIT".to_string()));
                pairs.push(("price", info.format_price(price)));
                let tif = if request.post_only { "PostOnly" } else { "GTC" };
                pairs.push(("timeInForce", tif.to_string()));
            }
            _ => pairs.push(("type", "MARKET".to_string())),
        }
        if request.reduce_only {
            pairs.push(("reduceOnly", "true".to_string()));
        }
        Ok(OrderParams {
            pairs,
            client_order_id,
        })
    }

    #[instrument(skip(self, request), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let params = self.order_params(request)?;
        let order = self.rest.place_order(&params.as_query()).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    /// Results are matched back to requests by client order id.
    #[instrument(skip(self, requests), fields(exchange = "bingx", count = requests.len()))]
    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();

        for (chunk_index, chunk) in requests.chunks(PLACE_CHUNK).enumerate() {
            let offset = chunk_index * PLACE_CHUNK;
            let mut items = Vec::with_capacity(chunk.len());
            let mut pending = Vec::with_capacity(chunk.len());
            for (i, request) in chunk.iter().enumerate() {
                match self.order_params(request) {
                    Ok(params) => {
                        items.push(params.as_json());
                        pending.push((offset + i, params.client_order_id));
                    }
                    Err(e) => result.record(offset + i, Err(e)),
                }
            }
            if items.is_empty() {
                continue;
            }

            match self.rest.place_batch(&items).await {
                Ok(orders) => {
                    for (index, client_id) in pending {
                        let outcome = orders
                            .iter()
                            .find(|o| o.client_order_id == client_id)
                            .map(|o| convert_order(o, &self.instrument))
                            .ok_or_else(|| {
                                ExchangeError::Other(format!(
                                    "order {} missing from batch response",
                                    client_id
                                ))
                            });
                        result.record(index, outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "bingx", error = %e, "Batch placement chunk failed");
                    fail_place_chunk(&mut result, pending.into_iter().map(|(i, _)| i), &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.rest
            .cancel_order(&self.instrument.native, order_id)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, order_ids), fields(exchange = "bingx", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(CANCEL_CHUNK) {
            match self.rest.cancel_batch(&self.instrument.native, chunk).await {
                Ok(answer) => {
                    for id in chunk {
                        let outcome = if answer.success.iter().any(|o| &o.order_id == id) {
                            Ok(())
                        } else if let Some(failure) = answer.failed.iter().find(|f| &f.order_id == id) {
                            Err(classify_error(failure.error_code, &failure.error_message))
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
                    warn!(exchange = "bingx", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(&self.instrument.native, order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        let orders = self.rest.get_open_orders(&self.instrument.native).await?;
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
    use crate::exchanges::bingx::conversions::SYMBOLS;
    use async_trait::async_trait;
    use reqwest::Method;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Batch cancel double: ids in `missing` fail with 80018, ids in `dropped`
    /// are absent from the answer.
    #[derive(Clone, Default)]
    struct CancelDouble {
        missing: Vec<&'static str>,
        dropped: Vec<&'static str>,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl RestClient for CancelDouble {
        async fn request(
            &self,
            _method: Method,
            _endpoint: &str,
            query: &[(&str, &str)],
            _body: &[u8],
            _auth: Auth,
        ) -> Result<Value, ExchangeError> {
            let list = query
                .iter()
                .find(|(k, _)| *k == "orderIdList")
                .map(|(_, v)| v.trim_matches(|c| c == '[' || c == ']').to_string())
                .unwrap();
            let ids: Vec<&str> = list.split(',').collect();
            self.calls.lock().unwrap().push(ids.len());

            let mut success = Vec::new();
            let mut failed = Vec::new();
            for id in ids {
                if self.missing.contains(&id) {
                    failed.push(json!({"orderId": id, "errorCode": 80018, "errorMessage": "order not exist"}));
                } else if !self.dropped.contains(&id) {
                    success.push(json!({"orderId": id, "symbol": "BTC-USDT", "status": "CANCELLED"}));
                }
            }
            Ok(json!({"code": 0, "msg": "", "data": {"success": success, "failed": failed}}))
        }
    }

    fn trading(rest: &CancelDouble) -> Trading<CancelDouble> {
        let instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        Trading::new(rest, Arc::new(instrument), Some("ogx"))
    }

    #[tokio::test]
    async fn test_batch_cancel_chunks_and_classifies_failures() {
        let rest = CancelDouble {
            missing: vec!["3", "7"],
            dropped: vec!["12"],
            ..CancelDouble::default()
        };
        let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
        let result = trading(&rest).batch_cancel_orders(&ids).await;

        assert_eq!(*rest.calls.lock().unwrap(), vec![10, 2]);
        assert_eq!(result.canceled.len(), 9);
        assert_eq!(result.already_resolved, vec!["3".to_string(), "7".to_string()]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, "12");
    }

    #[test]
    fn test_limit_params_carry_flags_and_prefixed_id() {
        let rest = CancelDouble::default();
        let mut request =
            OrderRequest::limit(OrderSide::Sell, Decimal::new(15, 3), Decimal::new(65_000, 0));
        request.post_only = true;
        request.reduce_only = true;

        let params = trading(&rest).order_params(&request).unwrap();
        let query = params.as_query();
        let get = |key: &str| query.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

        assert_eq!(get("symbol"), Some("BTC-USDT"));
        assert_eq!(get("side"), Some("SELL"));
        assert_eq!(get("positionSide"), Some("BOTH"));
        assert_eq!(get("type"), Some("LIMIT"));
        assert_eq!(get("timeInForce"), Some("PostOnly"));
        assert_eq!(get("reduceOnly"), Some("true"));
        assert!(params.client_order_id.starts_with("ogx"));
        assert!(params.client_order_id.len() <= CLIENT_ID_MAX_LEN);
        assert_eq!(params.as_json()["clientOrderID"], json!(params.client_order_id));
    }

    #[test]
    fn test_market_order_has_no_price() {
        let rest = CancelDouble::default();
        let request = OrderRequest {
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: Decimal::ONE,
            price: None,
            client_order_id: Some("mine".to_string()),
            reduce_only: false,
            post_only: false,
        };
        let params = trading(&rest).order_params(&request).unwrap();
        let query = params.as_query();

        assert!(query.contains(&("type", "MARKET")));
        assert!(!query.iter().any(|(k, _)| *k == "price" || *k == "reduceOnly"));
        assert_eq!(params.client_order_id, "mine");
    }
}
