use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::gate::conversions::SETTLE;
use crate::exchanges::gate::types::{
    GateAccount, GateBatchItem, GateCancelItem, GateCandle, GateContract, GateErrorBody, GateOrder,
    GatePosition,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

const MAX_CANDLES: u32 = 2000;

/// Classify a Gate error label; label and message are kept verbatim.
pub fn classify_error(label: &str, message: &str) -> ExchangeError {
    let kind = match label {
        "ORDER_NOT_FOUND" | "ORDER_FINISHED" | "ORDER_CLOSED" => ApiErrorKind::OrderNotFound,
        "INSUFFICIENT_AVAILABLE" | "BALANCE_NOT_ENOUGH" | "MARGIN_BALANCE_NOT_ENOUGH" => {
            ApiErrorKind::InsufficientMargin
        }
        "TOO_MANY_REQUESTS" => ApiErrorKind::RateLimited,
        "INVALID_KEY" | "INVALID_SIGNATURE" | "REQUEST_EXPIRED" | "MISSING_REQUIRED_HEADER"
        | "FORBIDDEN" | "READ_ONLY" => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(label, message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse Gate response: {}", e))
    })
}

/// Gate answers errors with HTTP 4xx/5xx and `{label, message}`.
fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: GateErrorBody| {
        classify_error(&body.label, &body.message)
    })
}

/// Split a batch placement answer into per-item order or error.
pub fn batch_outcomes(items: Vec<Value>) -> Vec<Result<GateOrder, ExchangeError>> {
    items
        .into_iter()
        .map(|item| {
            let flags: GateBatchItem = parse(item.clone())?;
            if flags.succeeded {
                parse(item)
            } else {
                Err(classify_error(&flags.label, &flags.detail))
            }
        })
        .collect()
}

fn path(tail: &str) -> String {
    format!("/api/v4/futures/{}{}", SETTLE, tail)
}

/// Gate APIv4 USDT-settled futures; responses are bare payloads.
#[derive(Debug, Clone)]
pub struct GateRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> GateRest<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<T, ExchangeError> {
        let body = match body {
            Some(body) => serde_json::to_vec(body).map_err(|e| {
                ExchangeError::SerializationError(format!("Failed to serialize Gate body: {}", e))
            })?,
            None => Vec::new(),
        };
        let value = self
            .rest
            .request(method, endpoint, params, &body, auth)
            .await
            .map_err(map_error)?;
        parse(value)
    }

    #[instrument(skip(self), fields(exchange = "gate", contract = %contract))]
    pub async fn get_contract(&self, contract: &str) -> Result<GateContract, ExchangeError> {
        self.call(
            Method::GET,
            &path(&format!("/contracts/{}", contract)),
            &[],
            None,
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self, order), fields(exchange = "gate"))]
    pub async fn place_order(&self, order: &Value) -> Result<GateOrder, ExchangeError> {
        self.call(Method::POST, &path("/orders"), &[], Some(order), Auth::Signed)
            .await
    }

    /// Answers in request order.
    #[instrument(skip(self, orders), fields(exchange = "gate", count = orders.len()))]
    pub async fn place_batch(
        &self,
        orders: &[Value],
    ) -> Result<Vec<Result<GateOrder, ExchangeError>>, ExchangeError> {
        let body = Value::Array(orders.to_vec());
        let items: Vec<Value> = self
            .call(Method::POST, &path("/batch_orders"), &[], Some(&body), Auth::Signed)
            .await?;
        Ok(batch_outcomes(items))
    }

    #[instrument(skip(self), fields(exchange = "gate", order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<GateOrder, ExchangeError> {
        self.call(
            Method::DELETE,
            &path(&format!("/orders/{}", order_id)),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self, order_ids), fields(exchange = "gate", count = order_ids.len()))]
    pub async fn cancel_batch(&self, order_ids: &[String]) -> Result<Vec<GateCancelItem>, ExchangeError> {
        let body = Value::from(order_ids.to_vec());
        self.call(
            Method::POST,
            &path("/batch_cancel_orders"),
            &[],
            Some(&body),
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "gate", order_id = %order_id))]
    pub async fn get_order(&self, order_id: &str) -> Result<GateOrder, ExchangeError> {
        self.call(
            Method::GET,
            &path(&format!("/orders/{}", order_id)),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "gate", contract = %contract))]
    pub async fn get_open_orders(&self, contract: &str) -> Result<Vec<GateOrder>, ExchangeError> {
        self.call(
            Method::GET,
            &path("/orders"),
            &[("contract", contract), ("status", "open")],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "gate"))]
    pub async fn get_account(&self) -> Result<GateAccount, ExchangeError> {
        self.call(Method::GET, &path("/accounts"), &[], None, Auth::Signed)
            .await
    }

    #[instrument(skip(self), fields(exchange = "gate", contract = %contract))]
    pub async fn get_position(&self, contract: &str) -> Result<GatePosition, ExchangeError> {
        self.call(
            Method::GET,
            &path(&format!("/positions/{}", contract)),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    /// Oldest first.
    #[instrument(skip(self), fields(exchange = "gate", contract = %contract, interval = %interval))]
    pub async fn get_candles(
        &self,
        contract: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<GateCandle>, ExchangeError> {
        let limit = limit.min(MAX_CANDLES).to_string();
        self.call(
            Method::GET,
            &path("/candlesticks"),
            &[("contract", contract), ("interval", interval), ("limit", &limit)],
            None,
            Auth::Public,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_error_body_is_classified() {
        let transport = ExchangeError::api(
            "404",
            r#"{"label":"ORDER_NOT_FOUND","message":"Order not found"}"#,
            ApiErrorKind::Other,
        );
        let err = map_error(transport);
        assert!(err.is_order_not_found());
        assert!(err.to_string().contains("ORDER_NOT_FOUND"));
    }

    #[test]
    fn test_unlabelled_body_keeps_transport_error() {
        let transport = ExchangeError::api("502", "<html>bad gateway</html>", ApiErrorKind::Other);
        assert!(matches!(map_error(transport), ExchangeError::ApiError { code, .. } if code == "502"));
    }

    #[test]
    fn test_batch_items_split_by_flag() {
        let outcomes = batch_outcomes(vec![
            json!({"succeeded": true, "id": 1, "contract": "BTC_USDT", "size": 1, "status": "open"}),
            json!({"succeeded": false, "label": "INSUFFICIENT_AVAILABLE", "detail": "balance"}),
        ]);
        assert_eq!(outcomes[0].as_ref().unwrap().id, "1");
        assert!(outcomes[1].as_ref().unwrap_err().is_insufficient_margin());
    }
}
