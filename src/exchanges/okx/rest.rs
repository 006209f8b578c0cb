use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::okx::types::{
    OkxAccountBalance, OkxCandleRow, OkxFundingRate, OkxInstrument, OkxOrder, OkxOrderAck,
    OkxPosition, OkxResponse,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;

/// OKX serves at most 300 candles per request.
const MAX_CANDLES: u32 = 300;

/// Classify an OKX error code; code and message are kept verbatim.
pub fn classify_error(code: &str, message: &str) -> ExchangeError {
    let kind = match code {
        "51400" | "51401" | "51402" | "51503" | "51603" => ApiErrorKind::OrderNotFound,
        "51008" | "51127" | "51131" => ApiErrorKind::InsufficientMargin,
        "50011" | "50061" => ApiErrorKind::RateLimited,
        "50101" | "50102" | "50103" | "50104" | "50105" | "50111" | "50113" => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code, message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse OKX response: {}", e))
    })
}

fn first_ack_error(data: &Value) -> Option<ExchangeError> {
    let ack: OkxOrderAck = serde_json::from_value(data.as_array()?.first()?.clone()).ok()?;
    (!ack.is_success()).then(|| classify_error(&ack.s_code, &ack.s_msg))
}

/// Unwrap `{code, msg, data}`; order endpoints explain failures per item.
pub fn unwrap_envelope(value: Value) -> Result<Value, ExchangeError> {
    let response: OkxResponse = parse(value)?;
    if response.code == "0" {
        return Ok(response.data);
    }
    Err(first_ack_error(&response.data)
        .unwrap_or_else(|| classify_error(&response.code, &response.msg)))
}

/// Batch endpoints answer `1` (all failed) or `2` (partial) with per-item acks.
fn unwrap_batch(value: Value) -> Result<Vec<OkxOrderAck>, ExchangeError> {
    let response: OkxResponse = parse(value)?;
    match response.code.as_str() {
        "0" | "1" | "2" if response.data.as_array().is_some_and(|a| !a.is_empty()) => {
            parse(response.data)
        }
        "0" => Ok(Vec::new()),
        _ => Err(classify_error(&response.code, &response.msg)),
    }
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: OkxResponse| {
        first_ack_error(&body.data).unwrap_or_else(|| classify_error(&body.code, &body.msg))
    })
}

fn single<T>(mut items: Vec<T>, what: &str) -> Result<T, ExchangeError> {
    if items.is_empty() {
        return Err(ExchangeError::DeserializationError(format!(
            "OKX returned no {}",
            what
        )));
    }
    Ok(items.swap_remove(0))
}

/// OKX v5 REST API for USDT-margined swaps
#[derive(Debug, Clone)]
pub struct OkxRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> OkxRest<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    async fn raw(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<Value, ExchangeError> {
        let body = match body {
            Some(body) => serde_json::to_vec(body).map_err(|e| {
                ExchangeError::SerializationError(format!("Failed to serialize OKX body: {}", e))
            })?,
            None => Vec::new(),
        };
        self.rest
            .request(method, endpoint, params, &body, auth)
            .await
            .map_err(map_error)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<T, ExchangeError> {
        let value = self.raw(method, endpoint, params, body, auth).await?;
        parse(unwrap_envelope(value)?)
    }

    #[instrument(skip(self), fields(exchange = "okx"))]
    pub async fn get_instrument(&self, inst_id: &str) -> Result<OkxInstrument, ExchangeError> {
        let items: Vec<OkxInstrument> = self
            .call(
                Method::GET,
                "/api/v5/public/instruments",
                &[("instType", "SWAP"), ("instId", inst_id)],
                None,
                Auth::Public,
            )
            .await?;
        single(items, "instrument")
    }

    #[instrument(skip(self, order), fields(exchange = "okx"))]
    pub async fn place_order(&self, order: &Value) -> Result<OkxOrderAck, ExchangeError> {
        let acks: Vec<OkxOrderAck> = self
            .call(Method::POST, "/api/v5/trade/order", &[], Some(order), Auth::Signed)
            .await?;
        single(acks, "order acknowledgement")
    }

    /// Up to 20 orders; one ack per order in request order.
    #[instrument(skip(self, orders), fields(exchange = "okx", count = orders.len()))]
    pub async fn place_batch(&self, orders: &[Value]) -> Result<Vec<OkxOrderAck>, ExchangeError> {
        let body = Value::Array(orders.to_vec());
        let value = self
            .raw(Method::POST, "/api/v5/trade/batch-orders", &[], Some(&body), Auth::Signed)
            .await?;
        unwrap_batch(value)
    }

    #[instrument(skip(self), fields(exchange = "okx", inst_id = %inst_id, order_id = %order_id))]
    pub async fn cancel_order(&self, inst_id: &str, order_id: &str) -> Result<OkxOrderAck, ExchangeError> {
        let body = json!({ "instId": inst_id, "ordId": order_id });
        let acks: Vec<OkxOrderAck> = self
            .call(Method::POST, "/api/v5/trade/cancel-order", &[], Some(&body), Auth::Signed)
            .await?;
        single(acks, "cancel acknowledgement")
    }

    #[instrument(skip(self, order_ids), fields(exchange = "okx", inst_id = %inst_id, count = order_ids.len()))]
    pub async fn cancel_batch(
        &self,
        inst_id: &str,
        order_ids: &[String],
    ) -> Result<Vec<OkxOrderAck>, ExchangeError> {
        let body = Value::Array(
            order_ids
                .iter()
                .map(|id| json!({ "instId": inst_id, "ordId": id }))
                .collect(),
        );
        let value = self
            .raw(
                Method::POST,
                "/api/v5/trade/cancel-batch-orders",
                &[],
                Some(&body),
                Auth::Signed,
            )
            .await?;
        unwrap_batch(value)
    }

    #[instrument(skip(self), fields(exchange = "okx", inst_id = %inst_id, order_id = %order_id))]
    pub async fn get_order(&self, inst_id: &str, order_id: &str) -> Result<OkxOrder, ExchangeError> {
        let orders: Vec<OkxOrder> = self
            .call(
                Method::GET,
                "/api/v5/trade/order",
                &[("instId", inst_id), ("ordId", order_id)],
                None,
                Auth::Signed,
            )
            .await?;
        single(orders, "order")
    }

    #[instrument(skip(self), fields(exchange = "okx", inst_id = %inst_id))]
    pub async fn get_pending_orders(&self, inst_id: &str) -> Result<Vec<OkxOrder>, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v5/trade/orders-pending",
            &[("instType", "SWAP"), ("instId", inst_id)],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "okx"))]
    pub async fn get_balance(&self) -> Result<OkxAccountBalance, ExchangeError> {
        let balances: Vec<OkxAccountBalance> = self
            .call(Method::GET, "/api/v5/account/balance", &[], None, Auth::Signed)
            .await?;
        single(balances, "account balance")
    }

    #[instrument(skip(self), fields(exchange = "okx", inst_id = %inst_id))]
    pub async fn get_positions(&self, inst_id: &str) -> Result<Vec<OkxPosition>, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v5/account/positions",
            &[("instType", "SWAP"), ("instId", inst_id)],
            None,
            Auth::Signed,
        )
        .await
    }

    /// Newest first, as OKX returns them.
    #[instrument(skip(self), fields(exchange = "okx", inst_id = %inst_id, bar = %bar))]
    pub async fn get_candles(
        &self,
        inst_id: &str,
        bar: &str,
        limit: u32,
    ) -> Result<Vec<OkxCandleRow>, ExchangeError> {
        let limit = limit.min(MAX_CANDLES).to_string();
        self.call(
            Method::GET,
            "/api/v5/market/candles",
            &[("instId", inst_id), ("bar", bar), ("limit", &limit)],
            None,
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "okx", inst_id = %inst_id))]
    pub async fn get_funding_rate(&self, inst_id: &str) -> Result<OkxFundingRate, ExchangeError> {
        let rates: Vec<OkxFundingRate> = self
            .call(
                Method::GET,
                "/api/v5/public/funding-rate",
                &[("instId", inst_id)],
                None,
                Auth::Public,
            )
            .await?;
        single(rates, "funding rate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_returns_data() {
        let data = unwrap_envelope(json!({"code": "0", "msg": "", "data": [{"ordId": "1"}]})).unwrap();
        assert_eq!(data[0]["ordId"], "1");
    }

    #[test]
    fn test_envelope_prefers_item_error() {
        let err = unwrap_envelope(json!({
            "code": "1",
            "msg": "Operation failed.",
            "data": [{"ordId": "", "sCode": "51008", "sMsg": "Order failed. Insufficient USDT margin in account"}]
        }))
        .unwrap_err();
        assert!(err.is_insufficient_margin());
        assert!(err.to_string().contains("51008"));
    }

    #[test]
    fn test_envelope_top_level_error() {
        let err = unwrap_envelope(json!({"code": "50111", "msg": "Invalid OK-ACCESS-KEY", "data": []})).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Auth));
    }

    #[test]
    fn test_partial_batch_keeps_items() {
        let acks = unwrap_batch(json!({
            "code": "2",
            "msg": "",
            "data": [
                {"ordId": "1", "sCode": "0", "sMsg": ""},
                {"ordId": "2", "sCode": "51400", "sMsg": "Cancellation failed as the order does not exist."}
            ]
        }))
        .unwrap();
        assert!(acks[0].is_success());
        assert!(!acks[1].is_success());
        assert!(classify_error(&acks[1].s_code, &acks[1].s_msg).is_order_not_found());
    }

    #[test]
    fn test_http_error_body_is_reclassified() {
        let transport = ExchangeError::api(
            "401",
            r#"{"code":"50113","msg":"Invalid Sign","data":[]}"#,
            ApiErrorKind::Auth,
        );
        let mapped = map_error(transport);
        assert!(matches!(mapped, ExchangeError::ApiError { ref code, .. } if code == "50113"));
    }
}
