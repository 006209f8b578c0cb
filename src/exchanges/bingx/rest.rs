use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::bingx::types::{
    BingxBalance, BingxBalanceEnvelope, BingxCancelBatch, BingxContract, BingxErrorBody,
    BingxKline, BingxListenKey, BingxOrder, BingxOrderEnvelope, BingxOrderList, BingxPosition,
    BingxPremiumIndex, BingxResponse,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

const MAX_CANDLES: u32 = 1440;
const LISTEN_KEY_PATH: &str = "/openApi/user/auth/userDataStream";

/// Classify a BingX error code; code and message are kept verbatim.
pub fn classify_error(code: i64, message: &str) -> ExchangeError {
    let kind = match code {
        // 80018: already filled or canceled
        80016 | 80018 | 109421 => ApiErrorKind::OrderNotFound,
        101204 | 110424 => ApiErrorKind::InsufficientMargin,
        100410 | 100503 => ApiErrorKind::RateLimited,
        100001 | 100413 | 100419 | 100421 => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code.to_string(), message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse BingX response: {}", e))
    })
}

pub fn unwrap_envelope(value: Value) -> Result<Value, ExchangeError> {
    let response: BingxResponse = parse(value)?;
    if response.code != 0 {
        return Err(classify_error(response.code, &response.msg));
    }
    Ok(response.data)
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: BingxErrorBody| classify_error(body.code, &body.msg))
}

/// BingX perpetual swap V2 API. All parameters go in the query string.
#[derive(Debug, Clone)]
pub struct BingxRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> BingxRest<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    async fn raw(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        auth: Auth,
    ) -> Result<Value, ExchangeError> {
        self.rest
            .request(method, endpoint, params, &[], auth)
            .await
            .map_err(map_error)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        auth: Auth,
    ) -> Result<T, ExchangeError> {
        parse(unwrap_envelope(self.raw(method, endpoint, params, auth).await?)?)
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol))]
    pub async fn get_contract(&self, symbol: &str) -> Result<BingxContract, ExchangeError> {
        let contracts: Vec<BingxContract> = self
            .call(
                Method::GET,
                "/openApi/swap/v2/quote/contracts",
                &[("symbol", symbol)],
                Auth::Public,
            )
            .await?;
        contracts
            .into_iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| ExchangeError::UnsupportedSymbol(symbol.to_string()))
    }

    #[instrument(skip(self, params), fields(exchange = "bingx"))]
    pub async fn place_order(&self, params: &[(&str, &str)]) -> Result<BingxOrder, ExchangeError> {
        let placed: BingxOrderEnvelope = self
            .call(Method::POST, "/openApi/swap/v2/trade/order", params, Auth::Signed)
            .await?;
        Ok(placed.order)
    }

    /// Up to five orders, serialized as a JSON array in `batchOrders`.
    #[instrument(skip(self, orders), fields(exchange = "bingx", count = orders.len()))]
    pub async fn place_batch(&self, orders: &[Value]) -> Result<Vec<BingxOrder>, ExchangeError> {
        let batch = Value::Array(orders.to_vec()).to_string();
        let placed: BingxOrderList = self
            .call(
                Method::POST,
                "/openApi/swap/v2/trade/batchOrders",
                &[("batchOrders", &batch)],
                Auth::Signed,
            )
            .await?;
        Ok(placed.orders)
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol, order_id = %order_id))]
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<BingxOrder, ExchangeError> {
        let canceled: BingxOrderEnvelope = self
            .call(
                Method::DELETE,
                "/openApi/swap/v2/trade/order",
                &[("symbol", symbol), ("orderId", order_id)],
                Auth::Signed,
            )
            .await?;
        Ok(canceled.order)
    }

    /// Up to ten ids per call.
    #[instrument(skip(self, order_ids), fields(exchange = "bingx", symbol = %symbol, count = order_ids.len()))]
    pub async fn cancel_batch(
        &self,
        symbol: &str,
        order_ids: &[String],
    ) -> Result<BingxCancelBatch, ExchangeError> {
        let ids = format!("[{}]", order_ids.join(","));
        self.call(
            Method::DELETE,
            "/openApi/swap/v2/trade/batchOrders",
            &[("symbol", symbol), ("orderIdList", &ids)],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol, order_id = %order_id))]
    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Result<BingxOrder, ExchangeError> {
        let found: BingxOrderEnvelope = self
            .call(
                Method::GET,
                "/openApi/swap/v2/trade/order",
                &[("symbol", symbol), ("orderId", order_id)],
                Auth::Signed,
            )
            .await?;
        Ok(found.order)
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol))]
    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<BingxOrder>, ExchangeError> {
        let open: BingxOrderList = self
            .call(
                Method::GET,
                "/openApi/swap/v2/trade/openOrders",
                &[("symbol", symbol)],
                Auth::Signed,
            )
            .await?;
        Ok(open.orders)
    }

    #[instrument(skip(self), fields(exchange = "bingx"))]
    pub async fn get_balance(&self) -> Result<BingxBalance, ExchangeError> {
        let balance: BingxBalanceEnvelope = self
            .call(Method::GET, "/openApi/swap/v2/user/balance", &[], Auth::Signed)
            .await?;
        Ok(balance.balance)
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol))]
    pub async fn get_positions(&self, symbol: &str) -> Result<Vec<BingxPosition>, ExchangeError> {
        self.call(
            Method::GET,
            "/openApi/swap/v2/user/positions",
            &[("symbol", symbol)],
            Auth::Signed,
        )
        .await
    }

    /// Sorted oldest first.
    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol, interval = %interval))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<BingxKline>, ExchangeError> {
        let limit = limit.min(MAX_CANDLES).to_string();
        let mut klines: Vec<BingxKline> = self
            .call(
                Method::GET,
                "/openApi/swap/v3/quote/klines",
                &[("symbol", symbol), ("interval", interval), ("limit", &limit)],
                Auth::Public,
            )
            .await?;
        klines.sort_by_key(|k| k.time);
        Ok(klines)
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %symbol))]
    pub async fn get_premium_index(&self, symbol: &str) -> Result<BingxPremiumIndex, ExchangeError> {
        self.call(
            Method::GET,
            "/openApi/swap/v2/quote/premiumIndex",
            &[("symbol", symbol)],
            Auth::Public,
        )
        .await
    }

    /// The listen-key endpoints answer without the envelope.
    pub async fn create_listen_key(&self) -> Result<String, ExchangeError> {
        let value = self
            .raw(Method::POST, LISTEN_KEY_PATH, &[], Auth::KeyOnly)
            .await?;
        let key: BingxListenKey = parse(value)?;
        Ok(key.listen_key)
    }

    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError> {
        self.raw(
            Method::PUT,
            LISTEN_KEY_PATH,
            &[("listenKey", listen_key)],
            Auth::KeyOnly,
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_classification() {
        assert!(classify_error(80016, "order not exist").is_order_not_found());
        assert!(classify_error(101204, "Insufficient margin").is_insufficient_margin());
        assert!(!classify_error(109400, "param error").is_order_not_found());
    }

    #[test]
    fn test_envelope() {
        let data = unwrap_envelope(json!({"code": 0, "msg": "", "data": {"listenKey": "x"}})).unwrap();
        assert_eq!(data["listenKey"], "x");
        let err = unwrap_envelope(json!({"code": 80016, "msg": "order does not exist"})).unwrap_err();
        assert!(err.is_order_not_found());
    }
}
