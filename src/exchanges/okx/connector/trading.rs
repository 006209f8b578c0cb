use crate::core::batch::{fail_chunk, fail_place_chunk};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderStatus, OrderType};
use crate::exchanges::okx::conversions::{convert_order, side_to_okx};
use crate::exchanges::okx::rest::{classify_error, OkxRest};
use crate::exchanges::okx::types::OkxOrderAck;
use crate::utils::client_id::ClientOrderIdGenerator;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Both batch endpoints accept up to 20 orders.
const BATCH_CHUNK: usize = 20;
const CLIENT_ID_MAX_LEN: usize = 32;

/// Order placement and cancellation on OKX USDT swaps.
pub struct Trading<R: RestClient> {
    rest: OkxRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: OkxRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    /// Order body; OKX sizes swaps in contracts on the `lotSz` grid.
    fn order_body(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;
        let contracts = info.to_contracts(request.quantity)?;

        let mut body = json!({
            "instId": self.instrument.native,
            "tdMode": "cross",
            "side": side_to_okx(request.side),
            "sz": contracts.normalize().to_string(),
            "clOrdId": self.ids.resolve(request.client_order_id.as_deref()),
        });
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                body["ordType"] = json!(if request.post_only { "post_only" } else { "limit" });
                body["px"] = json!(info.format_price(price));
            }
            _ => body["ordType"] = json!("market"),
        }
        if request.reduce_only {
            body["reduceOnly"] = json!(true);
        }
        Ok(body)
    }

    /// OKX acknowledges with ids only; the request fills in the rest.
    fn acknowledged(&self, ack: &OkxOrderAck, request: &OrderRequest) -> Order {
        let now = chrono::Utc::now().timestamp_millis();
        Order {
            order_id: ack.ord_id.clone(),
            client_order_id: ack.cl_ord_id.clone(),
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

    fn ack_result(&self, ack: &OkxOrderAck, request: &OrderRequest) -> Result<Order, ExchangeError> {
        if ack.is_success() {
            Ok(self.acknowledged(ack, request))
        } else {
            Err(classify_error(&ack.s_code, &ack.s_msg))
        }
    }

    #[instrument(skip(self, request), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let body = self.order_body(request)?;
        let ack = self.rest.place_order(&body).await?;
        self.ack_result(&ack, request)
    }

    #[instrument(skip(self, requests), fields(exchange = "okx", count = requests.len()))]
    pub async fn batch_place_orders(&self, requests: &[OrderRequest]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();

        for (chunk_index, chunk) in requests.chunks(BATCH_CHUNK).enumerate() {
            let offset = chunk_index * BATCH_CHUNK;
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
                Ok(acks) => {
                    for (index, ack) in indices.into_iter().zip(acks.iter()) {
                        result.record(index, self.ack_result(ack, &requests[index]));
                    }
                }
                Err(e) => {
                    warn!(exchange = "okx", error = %e, "Batch placement chunk failed");
                    fail_place_chunk(&mut result, indices, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let ack = self.rest.cancel_order(&self.instrument.native, order_id).await?;
        if ack.is_success() {
            Ok(())
        } else {
            Err(classify_error(&ack.s_code, &ack.s_msg))
        }
    }

    #[instrument(skip(self, order_ids), fields(exchange = "okx", count = order_ids.len()))]
    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        let mut result = BatchCancelResult::default();

        for chunk in order_ids.chunks(BATCH_CHUNK) {
            match self.rest.cancel_batch(&self.instrument.native, chunk).await {
                Ok(acks) => {
                    for (id, ack) in chunk.iter().zip(acks.iter()) {
                        let outcome = if ack.is_success() {
                            Ok(())
                        } else {
                            Err(classify_error(&ack.s_code, &ack.s_msg))
                        };
                        result.record(id.clone(), outcome);
                    }
                }
                Err(e) => {
                    warn!(exchange = "okx", error = %e, "Batch cancel chunk failed");
                    fail_chunk(&mut result, chunk, &e);
                }
            }
        }
        result
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(&self.instrument.native, order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
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
    use crate::exchanges::okx::conversions::{convert_symbol_info, SYMBOLS};
    use crate::exchanges::okx::types::OkxInstrument;
    use async_trait::async_trait;
    use reqwest::Method;

    #[derive(Clone)]
    struct NoRest;

    #[async_trait]
    impl RestClient for NoRest {
        async fn request(
            &self,
            _method: Method,
            endpoint: &str,
            _query: &[(&str, &str)],
            _body: &[u8],
            _auth: Auth,
        ) -> Result<Value, ExchangeError> {
            Err(ExchangeError::Other(format!("unexpected call to {}", endpoint)))
        }
    }

    fn trading(lot_sz: &str) -> Trading<NoRest> {
        let swap: OkxInstrument = serde_json::from_value(json!({
            "instId": "BTC-USDT-SWAP", "ctVal": "0.01", "ctMult": "1", "tickSz": "0.1",
            "lotSz": lot_sz, "ctValCcy": "BTC", "settleCcy": "USDT"
        }))
        .unwrap();
        let mut instrument = Instrument::resolve(&SYMBOLS, "BTCUSDT").unwrap();
        instrument.info = convert_symbol_info(&swap);
        Trading::new(&NoRest, Arc::new(instrument), None)
    }

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_fractional_lot_sizes_the_order_exactly() {
        let trading = trading("0.01");
        let body = trading
            .order_body(&OrderRequest::limit(OrderSide::Buy, d("0.015"), d("27000")))
            .unwrap();
        assert_eq!(body["sz"], "1.5");
        assert_eq!(body["ordType"], "limit");

        let body = trading
            .order_body(&OrderRequest::market(OrderSide::Sell, d("0.005")))
            .unwrap();
        assert_eq!(body["sz"], "0.5");
        assert_eq!(body["ordType"], "market");
    }

    #[test]
    fn test_whole_lot_truncates_and_rejects_dust() {
        let trading = trading("1");
        let body = trading
            .order_body(&OrderRequest::market(OrderSide::Buy, d("0.015")))
            .unwrap();
        assert_eq!(body["sz"], "1");
        assert!(matches!(
            trading.order_body(&OrderRequest::market(OrderSide::Buy, d("0.005"))),
            Err(ExchangeError::InvalidParameters(_))
        ));
    }
}
