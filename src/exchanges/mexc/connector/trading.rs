use crate::core::batch::{fail_chunk, place_sequentially};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{
    BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderStatus, OrderType,
};
use crate::exchanges::mexc::conversions::{
    convert_order, order_type_to_mexc, side_to_mexc, EXCHANGE, OPEN_TYPE_CROSS,
};
use crate::exchanges::mexc::rest::{classify_error, MexcRest};
use crate::utils::client_id::ClientOrderIdGenerator;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

const CANCEL_CHUNK: usize = 50;
const CLIENT_ID_MAX_LEN: usize = 32;

/// MEXC wants numeric JSON for price and volume.
fn number(formatted: String) -> Result<Value, ExchangeError> {
    serde_json::from_str::<serde_json::Number>(&formatted)
        .map(Value::Number)
        .map_err(|e| ExchangeError::InvalidParameters(format!("bad number {}: {}", formatted, e)))
}

/// Order entry on MEXC contracts. Placement has no batch endpoint for
/// regular accounts, so batches place one order at a time.
pub struct Trading<R: RestClient> {
    rest: MexcRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: MexcRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    fn order_body(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;
        let contracts = info.to_contracts(request.quantity)?;

        let mut body = json!({
            "symbol": self.instrument.native,
            "vol": number(contracts.normalize().to_string())?,
            "side": side_to_mexc(request.side, request.reduce_only),
            "type": order_type_to_mexc(request.order_type, request.post_only),
            "openType": OPEN_TYPE_CROSS,
            "externalOid": self.ids.resolve(request.client_order_id.as_deref()),
        });
        if let (OrderType::Limit, Some(price)) = (request.order_type, request.price) {
            body["price"] = number(info.format_price(price))?;
        }
        Ok(body)
    }

    /// The submit call answers with the id only.
    #[instrument(skip(self, request), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let body = self.order_body(request)?;
        let order_id = self.rest.place_order(&body).await?;
        let now = chrono::Utc::now().timestamp_millis();
        Ok(Order {
            order_id,
            client_order_id: body["externalOid"].as_str().unwrap_or_default().to_string(),
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
        })
    }

    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        place_sequentially(EXCHANGE, requests, |request| async move {
            self.place_order(&request).await
        })
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let items = self.rest.cancel_batch(&[order_id.to_string()]).await?;
        match items.iter().find(|item| item.order_id == order_id) {
            Some(item) if item.error_code != 0 => {
                Err(classify_error(item.error_code, &item.error_msg))
            }
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, order_ids), fields(exchange = "mexc", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(CANCEL_CHUNK) {
            match self.rest.cancel_batch(chunk).await {
                Ok(items) => {
                    for id in chunk {
                        let outcome = match items.iter().find(|item| &item.order_id == id) {
                            Some(item) if item.error_code == 0 => Ok(()),
                            Some(item) => Err(classify_error(item.error_code, &item.error_msg)),
                            None => Err(ExchangeError::Other(format!(
                                "order {} missing from batch response",
                                id
                            ))),
                        };
                        result.record(id.clone(), outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "mexc", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
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
    use crate::exchanges::mexc::conversions::SYMBOLS;
    use async_trait::async_trait;
    use reqwest::Method;
    use std::sync::Mutex;

    /// Answers cancels with error 2041 for ids listed in `missing`.
    #[derive(Clone, Default)]
    struct CancelDouble {
        missing: Vec<&'static str>,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl RestClient for CancelDouble {
        async fn request(
            &self,
            _method: Method,
            _endpoint: &str,
            _query: &[(&str, &str)],
            body: &[u8],
            _auth: Auth,
        ) -> Result<Value, ExchangeError> {
            let ids: Vec<String> = serde_json::from_slice(body).unwrap();
            self.calls.lock().unwrap().push(ids.len());
            let items: Vec<Value> = ids
                .iter()
                .map(|id| {
                    if self.missing.contains(&id.as_str()) {
                        json!({"orderId": id, "errorCode": 2041, "errorMsg": "order not exist"})
                    } else {
                        json!({"orderId": id, "errorCode": 0, "errorMsg": "success"})
                    }
                })
                .collect();
            Ok(json!({"success": true, "code": 0, "data": items}))
        }
    }

    fn trading(rest: &CancelDouble) -> Trading<CancelDouble> {
        let instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        Trading::new(rest, Arc::new(instrument), None)
    }

    #[test]
    fn test_number_keeps_decimal_text() {
        assert_eq!(number("60000.5".to_string()).unwrap().to_string(), "60000.5");
        assert!(number("abc".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_batch_cancel_chunks_and_tolerates_missing_orders() {
        let rest = CancelDouble {
            missing: vec!["3", "57"],
            ..CancelDouble::default()
        };
        let ids: Vec<String> = (1..=60).map(|i| i.to_string()).collect();
        let result = trading(&rest).batch_cancel_orders(&ids).await;

        assert_eq!(*rest.calls.lock().unwrap(), vec![50, 10]);
        assert_eq!(result.canceled.len(), 58);
        assert_eq!(result.already_resolved, vec!["3".to_string(), "57".to_string()]);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn test_single_cancel_surfaces_item_error() {
        let rest = CancelDouble {
            missing: vec!["9"],
            ..CancelDouble::default()
        };
        let err = trading(&rest).cancel_order("9").await.unwrap_err();
        assert!(err.is_order_not_found());
    }
}
