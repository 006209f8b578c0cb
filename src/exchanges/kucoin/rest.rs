use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::kucoin::types::{
    KucoinAccountOverview, KucoinBullet, KucoinContract, KucoinKlineRow, KucoinOrder,
    KucoinOrderAck, KucoinPage, KucoinPosition, KucoinResponse,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

const SUCCESS: &str = "200000";
const MAX_CANDLES: u32 = 500;

pub fn classify_error(code: &str, message: &str) -> ExchangeError {
    let kind = match code {
        "100004" | "404000" => ApiErrorKind::OrderNotFound,
        "200004" | "300003" => ApiErrorKind::InsufficientMargin,
        "429000" | "1015" => ApiErrorKind::RateLimited,
        "400001" | "400002" | "400003" | "400004" | "400005" | "400006" | "400007" | "411100" => {
            ApiErrorKind::Auth
        }
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code, message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse KuCoin response: {}", e))
    })
}

pub fn unwrap_envelope(value: Value) -> Result<Value, ExchangeError> {
    let response: KucoinResponse = parse(value)?;
    if response.code != SUCCESS {
        return Err(classify_error(&response.code, &response.msg));
    }
    Ok(response.data)
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: KucoinResponse| {
        classify_error(&body.code, &body.msg)
    })
}

/// KuCoin Futures REST API for USDT-margined perpetuals
#[derive(Debug, Clone)]
pub struct KucoinRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> KucoinRest<R> {
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
                ExchangeError::SerializationError(format!("Failed to serialize KuCoin body: {}", e))
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

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %symbol))]
    pub async fn get_contract(&self, symbol: &str) -> Result<KucoinContract, ExchangeError> {
        self.call(
            Method::GET,
            &format!("/api/v1/contracts/{}", symbol),
            &[],
            None,
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self, order), fields(exchange = "kucoin"))]
    pub async fn place_order(&self, order: &Value) -> Result<KucoinOrderAck, ExchangeError> {
        self.call(Method::POST, "/api/v1/orders", &[], Some(order), Auth::Signed)
            .await
    }

    #[instrument(skip(self), fields(exchange = "kucoin", order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<Value, ExchangeError> {
        self.call(
            Method::DELETE,
            &format!("/api/v1/orders/{}", order_id),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "kucoin", order_id = %order_id))]
    pub async fn get_order(&self, order_id: &str) -> Result<KucoinOrder, ExchangeError> {
        self.call(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            &[],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %symbol))]
    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<KucoinOrder>, ExchangeError> {
        let page: KucoinPage<KucoinOrder> = self
            .call(
                Method::GET,
                "/api/v1/orders",
                &[("status", "active"), ("symbol", symbol)],
                None,
                Auth::Signed,
            )
            .await?;
        Ok(page.items)
    }

    #[instrument(skip(self), fields(exchange = "kucoin", currency = %currency))]
    pub async fn get_account_overview(&self, currency: &str) -> Result<KucoinAccountOverview, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v1/account-overview",
            &[("currency", currency)],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %symbol))]
    pub async fn get_position(&self, symbol: &str) -> Result<KucoinPosition, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v1/position",
            &[("symbol", symbol)],
            None,
            Auth::Signed,
        )
        .await
    }

    /// The endpoint takes a time window; it is sized to cover `limit` bars.
    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %symbol, granularity = %granularity))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        granularity: &str,
        limit: u32,
        now_ms: i64,
    ) -> Result<Vec<KucoinKlineRow>, ExchangeError> {
        let minutes: i64 = granularity.parse().unwrap_or(1);
        let from = now_ms - i64::from(limit.min(MAX_CANDLES)) * minutes * 60_000;
        let (from, to) = (from.to_string(), now_ms.to_string());
        self.call(
            Method::GET,
            "/api/v1/kline/query",
            &[
                ("symbol", symbol),
                ("granularity", granularity),
                ("from", &from),
                ("to", &to),
            ],
            None,
            Auth::Public,
        )
        .await
    }

    /// Push-service token; private tokens are signed.
    #[instrument(skip(self), fields(exchange = "kucoin"))]
    pub async fn get_bullet(&self, private: bool) -> Result<KucoinBullet, ExchangeError> {
        let (endpoint, auth) = if private {
            ("/api/v1/bullet-private", Auth::Signed)
        } else {
            ("/api/v1/bullet-public", Auth::Public)
        };
        self.call(Method::POST, endpoint, &[], None, auth).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success() {
        let data = unwrap_envelope(json!({"code": "200000", "data": {"orderId": "1"}})).unwrap();
        assert_eq!(data["orderId"], "1");
    }

    #[test]
    fn test_insufficient_balance_is_classified() {
        let err = unwrap_envelope(json!({"code": "300003", "msg": "Balance insufficient"})).unwrap_err();
        assert!(err.is_insufficient_margin());
    }

    #[test]
    fn test_http_body_is_reclassified() {
        let transport = ExchangeError::api(
            "401",
            r#"{"code":"400005","msg":"Invalid KC-API-SIGN"}"#,
            ApiErrorKind::Other,
        );
        assert!(matches!(
            map_error(transport),
            ExchangeError::ApiError { kind: ApiErrorKind::Auth, .. }
        ));
    }
}
