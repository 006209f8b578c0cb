use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::core::types::serde_helpers::value_to_i64;
use crate::exchanges::mexc::types::{
    MexcAsset, MexcCancelItem, MexcContract, MexcErrorBody, MexcFunding, MexcKlines, MexcOrder,
    MexcPosition, MexcResponse, MexcTicker,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

const MAX_CANDLES: u32 = 2000;
const OPEN_ORDERS_PAGE: &str = "100";

/// Classify a MEXC contract API error code; code and message are kept verbatim.
pub fn classify_error(code: i64, message: &str) -> ExchangeError {
    let kind = match code {
        2040 | 2041 | 2042 => ApiErrorKind::OrderNotFound,
        2005 | 2006 => ApiErrorKind::InsufficientMargin,
        510 => ApiErrorKind::RateLimited,
        401 | 402 | 406 | 602 | 603 => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code.to_string(), message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse MEXC response: {}", e))
    })
}

/// `success: false` (or a non-zero code) becomes a classified API error.
pub fn unwrap_envelope(value: Value) -> Result<Value, ExchangeError> {
    let response: MexcResponse = parse(value)?;
    if !response.success || response.code != 0 {
        return Err(classify_error(response.code, &response.message));
    }
    Ok(response.data)
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: MexcErrorBody| {
        classify_error(body.code, &body.message)
    })
}

/// MEXC contract REST API (`contract.mexc.com`).
#[derive(Debug, Clone)]
pub struct MexcRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> MexcRest<R> {
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
                ExchangeError::SerializationError(format!("Failed to serialize MEXC body: {}", e))
            })?,
            None => Vec::new(),
        };
        let value = self
            .rest
            .request(method, endpoint, params, &body, auth)
            .await
            .map_err(map_error)?;
        parse(unwrap_envelope(value)?)
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %symbol))]
    pub async fn get_contract(&self, symbol: &str) -> Result<MexcContract, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v1/contract/detail",
            &[("symbol", symbol)],
            None,
            Auth::Public,
        )
        .await
    }

    /// Returns the new order id.
    #[instrument(skip(self, order), fields(exchange = "mexc"))]
    pub async fn place_order(&self, order: &Value) -> Result<String, ExchangeError> {
        let id: Value = self
            .call(
                Method::POST,
                "/api/v1/private/order/submit",
                &[],
                Some(order),
                Auth::Signed,
            )
            .await?;
        Ok(match id {
            Value::String(s) => s,
            other => value_to_i64(&other).to_string(),
        })
    }

    /// Up to 50 ids per call; the answer has one entry per id.
    #[instrument(skip(self, order_ids), fields(exchange = "mexc", count = order_ids.len()))]
    pub async fn cancel_batch(&self, order_ids: &[String]) -> Result<Vec<MexcCancelItem>, ExchangeError> {
        let body = Value::from(order_ids.to_vec());
        self.call(
            Method::POST,
            "/api/v1/private/order/cancel",
            &[],
            Some(&body),
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", order_id = %order_id))]
    pub async fn get_order(&self, order_id: &str) -> Result<MexcOrder, ExchangeError> {
        self.call(
            Method::GET,
            &format!("/api/v1/private/order/get/{}", order_id),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %symbol))]
    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<MexcOrder>, ExchangeError> {
        self.call(
            Method::GET,
            &format!("/api/v1/private/order/list/open_orders/{}", symbol),
            &[("page_num", "1"), ("page_size", OPEN_ORDERS_PAGE)],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", currency = %currency))]
    pub async fn get_asset(&self, currency: &str) -> Result<MexcAsset, ExchangeError> {
        self.call(
            Method::GET,
            &format!("/api/v1/private/account/asset/{}", currency),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %symbol))]
    pub async fn get_open_positions(&self, symbol: &str) -> Result<Vec<MexcPosition>, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v1/private/position/open_positions",
            &[("symbol", symbol)],
            None,
            Auth::Signed,
        )
        .await
    }

    /// The endpoint takes a window in seconds; it is sized to cover `limit` bars.
    #[instrument(skip(self), fields(exchange = "mexc", symbol = %symbol, interval = %interval))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        span_secs: i64,
        limit: u32,
        now_secs: i64,
    ) -> Result<MexcKlines, ExchangeError> {
        let start = now_secs - i64::from(limit.min(MAX_CANDLES)) * span_secs;
        let (start, end) = (start.to_string(), now_secs.to_string());
        self.call(
            Method::GET,
            &format!("/api/v1/contract/kline/{}", symbol),
            &[("interval", interval), ("start", &start), ("end", &end)],
            None,
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %symbol))]
    pub async fn get_funding_rate(&self, symbol: &str) -> Result<MexcFunding, ExchangeError> {
        self.call(
            Method::GET,
            &format!("/api/v1/contract/funding_rate/{}", symbol),
            &[],
            None,
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %symbol))]
    pub async fn get_ticker(&self, symbol: &str) -> Result<MexcTicker, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v1/contract/ticker",
            &[("symbol", symbol)],
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
    fn test_envelope_failure_is_classified() {
        let err = unwrap_envelope(json!({
            "success": false, "code": 2005, "message": "Insufficient balance"
        }))
        .unwrap_err();
        assert!(err.is_insufficient_margin());
        assert!(err.to_string().contains("2005"));
    }

    #[test]
    fn test_envelope_success_yields_data() {
        let data = unwrap_envelope(json!({"success": true, "code": 0, "data": 739113577038255616_i64})).unwrap();
        assert_eq!(data, json!(739113577038255616_i64));
    }

    #[test]
    fn test_http_error_body_is_classified() {
        let transport = ExchangeError::api(
            "429",
            r#"{"success":false,"code":510,"message":"Request frequently too fast!"}"#,
            ApiErrorKind::Other,
        );
        assert!(matches!(
            map_error(transport),
            ExchangeError::ApiError { kind: ApiErrorKind::RateLimited, .. }
        ));
    }
}
