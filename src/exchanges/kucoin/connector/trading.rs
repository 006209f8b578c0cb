use crate::core::batch::{cancel_sequentially, place_sequentially};
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::symbols::Instrument;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest, OrderStatus, OrderType};
use crate::exchanges::kucoin::conversions::{convert_order, side_to_kucoin, EXCHANGE};
use crate::exchanges::kucoin::rest::KucoinRest;
use crate::utils::client_id::ClientOrderIdGenerator;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

const CLIENT_ID_MAX_LEN: usize = 40;

/// Order leverage is ignored in cross mode but the field is mandatory.
const ORDER_LEVERAGE: u32 = 1;

/// Order placement and cancellation on KuCoin Futures; there are no batch
/// endpoints for this product, so batches run one order at a time.
pub struct Trading<R: RestClient> {
    rest: KucoinRest<R>,
    instrument: Arc<Instrument>,
    ids: ClientOrderIdGenerator,
}

impl<R: RestClient> Trading<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, broker_prefix: Option<&str>) -> Self
    where
        R: Clone,
    {
        Self {
            rest: KucoinRest::new(rest.clone()),
            instrument,
            ids: ClientOrderIdGenerator::new(CLIENT_ID_MAX_LEN).with_broker_prefix(broker_prefix),
        }
    }

    fn order_body(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        request.validate()?;
        let info = &self.instrument.info;
        let lots = info.to_contracts(request.quantity)?;
        let lots = lots.to_i64().ok_or_else(|| {
            ExchangeError::InvalidParameters(format!("lot count {} out of range", lots))
        })?;

        let mut body = json!({
            "clientOid": self.ids.resolve(request.client_order_id.as_deref()),
            "symbol": self.instrument.native,
            "side": side_to_kucoin(request.side),
            "size": lots,
            "leverage": ORDER_LEVERAGE,
            "marginMode": "CROSS",
        });
        match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) => {
                body["type"] = json!("limit");
                body["price"] = json!(info.format_price(price));
                body["timeInForce"] = json!("GTC");
                if request.post_only {
                    body["postOnly"] = json!(true);
                }
            }
            _ => body["type"] = json!("market"),
        }
        if request.reduce_only {
            body["reduceOnly"] = json!(true);
        }
        Ok(body)
    }

    #[instrument(skip(self, request), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let body = self.order_body(request)?;
        let ack = self.rest.place_order(&body).await?;
        let now = chrono::Utc::now().timestamp_millis();
        Ok(Order {
            order_id: ack.order_id,
            client_order_id: if ack.client_oid.is_empty() {
                body["clientOid"].as_str().unwrap_or_default().to_string()
            } else {
                ack.client_oid
            },
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

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.rest.cancel_order(order_id).await.map(|_| ())
    }

    pub async fn batch_cancel_orders(&self, order_ids: &[String]) -> BatchCancelResult {
        cancel_sequentially(EXCHANGE, order_ids, |order_id| async move {
            self.cancel_order(&order_id).await
        })
        .await
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let order = self.rest.get_order(order_id).await?;
        Ok(convert_order(&order, &self.instrument))
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_open_orders(&self) -> Result<Vec<Order>, ExchangeError> {
        let orders = self.rest.get_open_orders(&self.instrument.native).await?;
        Ok(orders
            .iter()
            .map(|order| convert_order(order, &self.instrument))
            .collect())
    }
}
