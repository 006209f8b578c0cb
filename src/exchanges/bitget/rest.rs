use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::bitget::conversions::PRODUCT_TYPE;
use crate::exchanges::bitget::types::{
    BitgetAccount, BitgetBatchResult, BitgetCandleRow, BitgetContract, BitgetFundingRate,
    BitgetOrder, BitgetOrderAck, BitgetPendingOrders, BitgetPosition, BitgetResponse,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;

const SUCCESS: &str = "00000";
const MAX_CANDLES: u32 = 1000;

/// Classify a Bitget error code; code and message are kept verbatim.
pub fn classify_error(code: &str, message: &str) -> ExchangeError {
    let kind = match code {
        "40768" | "43001" | "43004" | "43025" => ApiErrorKind::OrderNotFound,
        "40754" | "40762" | "43012" => ApiErrorKind::InsufficientMargin,
        "429" | "40010" => ApiErrorKind::RateLimited,
        "40006" | "40009" | "40012" | "40037" => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code, message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse Bitget response: {}", e))
    })
}

pub fn unwrap_envelope(value: Value) -> Result<Value, ExchangeError> {
    let response: BitgetResponse = parse(value)?;
    if response.code != SUCCESS {
        return Err(classify_error(&response.code, &response.msg));
    }
    Ok(response.data)
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: BitgetResponse| {
        classify_error(&body.code, &body.msg)
    })
}

/// Bitget v2 mix REST API for USDT-margined futures
#[derive(Debug, Clone)]
pub struct BitgetRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> BitgetRest<R> {
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
                ExchangeError::SerializationError(format!("Failed to serialize Bitget body: {}", e))
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

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol))]
    pub async fn get_contract(&self, symbol: &str) -> Result<BitgetContract, ExchangeError> {
        let contracts: Vec<BitgetContract> = self
            .call(
                Method::GET,
                "/api/v2/mix/market/contracts",
                &[("productType", PRODUCT_TYPE), ("symbol", symbol)],
                None,
                Auth::Public,
            )
            .await?;
        contracts
            .into_iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| ExchangeError::UnsupportedSymbol(symbol.to_string()))
    }

    #[instrument(skip(self, order), fields(exchange = "bitget"))]
    pub async fn place_order(&self, order: &Value) -> Result<BitgetOrderAck, ExchangeError> {
        self.call(
            Method::POST,
            "/api/v2/mix/order/place-order",
            &[],
            Some(order),
            Auth::Signed,
        )
        .await
    }

    /// `common` carries the symbol-level fields shared by every order.
    #[instrument(skip(self, common, orders), fields(exchange = "bitget", count = orders.len()))]
    pub async fn place_batch(&self, common: Value, orders: &[Value]) -> Result<BitgetBatchResult, ExchangeError> {
        let mut body = common;
        body["orderList"] = Value::Array(orders.to_vec());
        self.call(
            Method::POST,
            "/api/v2/mix/order/batch-place-order",
            &[],
            Some(&body),
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol, order_id = %order_id))]
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<BitgetOrderAck, ExchangeError> {
        let body = json!({ "symbol": symbol, "productType": PRODUCT_TYPE, "orderId": order_id });
        self.call(
            Method::POST,
            "/api/v2/mix/order/cancel-order",
            &[],
            Some(&body),
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self, order_ids), fields(exchange = "bitget", symbol = %symbol, count = order_ids.len()))]
    pub async fn cancel_batch(&self, symbol: &str, order_ids: &[String]) -> Result<BitgetBatchResult, ExchangeError> {
        let ids: Vec<Value> = order_ids.iter().map(|id| json!({ "orderId": id })).collect();
        let body = json!({ "symbol": symbol, "productType": PRODUCT_TYPE, "orderIdList": ids });
        self.call(
            Method::POST,
            "/api/v2/mix/order/batch-cancel-orders",
            &[],
            Some(&body),
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol, order_id = %order_id))]
    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Result<BitgetOrder, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v2/mix/order/detail",
            &[("symbol", symbol), ("productType", PRODUCT_TYPE), ("orderId", order_id)],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol))]
    pub async fn get_pending_orders(&self, symbol: &str) -> Result<Vec<BitgetOrder>, ExchangeError> {
        let pending: BitgetPendingOrders = self
            .call(
                Method::GET,
                "/api/v2/mix/order/orders-pending",
                &[("productType", PRODUCT_TYPE), ("symbol", symbol)],
                None,
                Auth::Signed,
            )
            .await?;
        Ok(pending.entrusted_list.unwrap_or_default())
    }

    #[instrument(skip(self), fields(exchange = "bitget"))]
    pub async fn get_accounts(&self) -> Result<Vec<BitgetAccount>, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v2/mix/account/accounts",
            &[("productType", PRODUCT_TYPE)],
            None,
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol))]
    pub async fn get_positions(&self, symbol: &str, margin_coin: &str) -> Result<Vec<BitgetPosition>, ExchangeError> {
        self.call(
            Method::GET,
            "/api/v2/mix/position/single-position",
            &[
                ("symbol", symbol),
                ("productType", PRODUCT_TYPE),
                ("marginCoin", margin_coin),
            ],
            None,
            Auth::Signed,
        )
        .await
    }

    /// Oldest first.
    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol, granularity = %granularity))]
    pub async fn get_candles(
        &self,
        symbol: &str,
        granularity: &str,
        limit: u32,
    ) -> Result<Vec<BitgetCandleRow>, ExchangeError> {
        let limit = limit.min(MAX_CANDLES).to_string();
        self.call(
            Method::GET,
            "/api/v2/mix/market/candles",
            &[
                ("symbol", symbol),
                ("productType", PRODUCT_TYPE),
                ("granularity", granularity),
                ("limit", &limit),
            ],
            None,
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %symbol))]
    pub async fn get_funding_rate(&self, symbol: &str) -> Result<BitgetFundingRate, ExchangeError> {
        let rates: Vec<BitgetFundingRate> = self
            .call(
                Method::GET,
                "/api/v2/mix/market/current-fund-rate",
                &[("symbol", symbol), ("productType", PRODUCT_TYPE)],
                None,
                Auth::Public,
            )
            .await?;
        rates
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::UnsupportedSymbol(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code_unwraps_data() {
        let data = unwrap_envelope(json!({"code": "00000", "msg": "success", "requestTime": 1, "data": {"orderId": "9"}})).unwrap();
        assert_eq!(data["orderId"], "9");
    }

    #[test]
    fn test_not_found_is_classified() {
        let err = unwrap_envelope(json!({"code": "40768", "msg": "Order does not exist", "data": null})).unwrap_err();
        assert!(err.is_order_not_found());
    }

    #[test]
    fn test_http_error_body_is_reclassified() {
        let transport = ExchangeError::api(
            "400",
            r#"{"code":"43012","msg":"Insufficient balance","requestTime":1,"data":null}"#,
            ApiErrorKind::Other,
        );
        assert!(map_error(transport).is_insufficient_margin());
    }
}
