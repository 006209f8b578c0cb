use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::binance::types::{
    BinanceAccountInfo, BinanceBalance, BinanceBatchItem, BinanceErrorBody, BinanceExchangeInfo,
    BinanceKlineRow, BinanceListenKey, BinanceOrder, BinancePositionRisk, BinancePremiumIndex,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

/// Classify a Binance error code; code and message are kept verbatim.
pub fn classify_error(code: i64, message: &str) -> ExchangeError {
    let kind = match code {
        -2011 | -2013 => ApiErrorKind::OrderNotFound,
        -2019 | -2018 => ApiErrorKind::InsufficientMargin,
        -1003 | -1015 => ApiErrorKind::RateLimited,
        -1022 | -2014 | -2015 => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code.to_string(), message, kind)
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: BinanceErrorBody| {
        classify_error(body.code, &body.msg)
    })
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    // Successful responses can still carry {code, msg} on some endpoints
    if let Ok(body) = serde_json::from_value::<BinanceErrorBody>(value.clone()) {
        if body.code < 0 {
            return Err(classify_error(body.code, &body.msg));
        }
    }
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse Binance response: {}", e))
    })
}

/// Binance USD-M futures REST API
#[derive(Debug, Clone)]
pub struct BinanceRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> BinanceRest<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        auth: Auth,
    ) -> Result<T, ExchangeError> {
        let value = self
            .rest
            .request(method, endpoint, params, &[], auth)
            .await
            .map_err(map_error)?;
        decode(value)
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_exchange_info(&self) -> Result<BinanceExchangeInfo, ExchangeError> {
        self.call(Method::GET, "/fapi/v1/exchangeInfo", &[], Auth::Public)
            .await
    }

    #[instrument(skip(self, params), fields(exchange = "binance"))]
    pub async fn place_order(&self, params: &[(&str, &str)]) -> Result<BinanceOrder, ExchangeError> {
        self.call(Method::POST, "/fapi/v1/order", params, Auth::Signed)
            .await
    }

    /// Up to five orders, serialized as a JSON array in `batchOrders`.
    #[instrument(skip(self, orders), fields(exchange = "binance", count = orders.len()))]
    pub async fn place_batch(&self, orders: &[Value]) -> Result<Vec<BinanceBatchItem>, ExchangeError> {
        let batch = Value::Array(orders.to_vec()).to_string();
        self.call(
            Method::POST,
            "/fapi/v1/batchOrders",
            &[("batchOrders", &batch)],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol, order_id = %order_id))]
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<BinanceOrder, ExchangeError> {
        self.call(
            Method::DELETE,
            "/fapi/v1/order",
            &[("symbol", symbol), ("orderId", order_id)],
            Auth::Signed,
        )
        .await
    }

    /// Up to ten ids per call, answered item by item in request order.
    #[instrument(skip(self, order_ids), fields(exchange = "binance", symbol = %symbol, count = order_ids.len()))]
    pub async fn cancel_batch(
        &self,
        symbol: &str,
        order_ids: &[String],
    ) -> Result<Vec<BinanceBatchItem>, ExchangeError> {
        let ids = format!("[{}]", order_ids.join(","));
        self.call(
            Method::DELETE,
            "/fapi/v1/batchOrders",
            &[("symbol", symbol), ("orderIdList", &ids)],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol, order_id = %order_id))]
    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Result<BinanceOrder, ExchangeError> {
        self.call(
            Method::GET,
            "/fapi/v1/order",
            &[("symbol", symbol), ("orderId", order_id)],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol))]
    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<BinanceOrder>, ExchangeError> {
        self.call(
            Method::GET,
            "/fapi/v1/openOrders",
            &[("symbol", symbol)],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_account_info(&self) -> Result<BinanceAccountInfo, ExchangeError> {
        self.call(Method::GET, "/fapi/v2/account", &[], Auth::Signed)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol))]
    pub async fn get_positions(&self, symbol: &str) -> Result<Vec<BinancePositionRisk>, ExchangeError> {
        self.call(
            Method::GET,
            "/fapi/v2/positionRisk",
            &[("symbol", symbol)],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn get_balances(&self) -> Result<Vec<BinanceBalance>, ExchangeError> {
        self.call(Method::GET, "/fapi/v2/balance", &[], Auth::Signed)
            .await
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol, interval = %interval))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<BinanceKlineRow>, ExchangeError> {
        let limit = limit.to_string();
        self.call(
            Method::GET,
            "/fapi/v1/klines",
            &[("symbol", symbol), ("interval", interval), ("limit", &limit)],
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol))]
    pub async fn get_premium_index(&self, symbol: &str) -> Result<BinancePremiumIndex, ExchangeError> {
        self.call(
            Method::GET,
            "/fapi/v1/premiumIndex",
            &[("symbol", symbol)],
            Auth::Public,
        )
        .await
    }

    pub async fn create_listen_key(&self) -> Result<String, ExchangeError> {
        let key: BinanceListenKey = self
            .call(Method::POST, "/fapi/v1/listenKey", &[], Auth::KeyOnly)
            .await?;
        Ok(key.listen_key)
    }

    pub async fn keepalive_listen_key(&self) -> Result<(), ExchangeError> {
        let _: Value = self
            .call(Method::PUT, "/fapi/v1/listenKey", &[], Auth::KeyOnly)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(classify_error(-2011, "Unknown order sent.").is_order_not_found());
        assert!(classify_error(-2019, "Margin is insufficient.").is_insufficient_margin());
        let other = classify_error(-1121, "Invalid symbol.");
        assert_eq!(other.to_string(), "API error: -1121 - Invalid symbol.");
    }

    #[test]
    fn test_http_error_body_is_reclassified() {
        let transport = ExchangeError::api(
            "400",
            r#"{"code":-2011,"msg":"Unknown order sent."}"#,
            ApiErrorKind::Other,
        );
        let mapped = map_error(transport);
        assert!(mapped.is_order_not_found());
        assert!(matches!(mapped, ExchangeError::ApiError { ref code, .. } if code == "-2011"));
    }

    #[test]
    fn test_decode_rejects_error_payload() {
        let value = serde_json::json!({"code": -1021, "msg": "Timestamp outside recvWindow"});
        let result: Result<BinanceListenKey, _> = decode(value);
        assert!(result.is_err());
    }
}
