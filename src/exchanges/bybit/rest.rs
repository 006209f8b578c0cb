use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::rest::{remap_http_error, Auth};
use crate::core::kernel::RestClient;
use crate::exchanges::bybit::types::{
    BybitInstrument, BybitItemStatus, BybitKlineRow, BybitList, BybitOrder, BybitOrderAck,
    BybitPosition, BybitResponse, BybitTicker, BybitWallet,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;

pub const CATEGORY: &str = "linear";

const MAX_KLINES: u32 = 1000;

/// Classify a Bybit `retCode`; code and message are kept verbatim.
pub fn classify_error(code: i64, message: &str) -> ExchangeError {
    let kind = match code {
        110001 | 110008 | 110010 | 170213 => ApiErrorKind::OrderNotFound,
        110004 | 110007 | 110012 | 110044 | 110045 => ApiErrorKind::InsufficientMargin,
        10006 | 10018 => ApiErrorKind::RateLimited,
        10003 | 10004 | 10005 | 10007 | 33004 => ApiErrorKind::Auth,
        _ => ApiErrorKind::Other,
    };
    ExchangeError::api(code.to_string(), message, kind)
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse Bybit response: {}", e))
    })
}

fn envelope(value: Value) -> Result<BybitResponse, ExchangeError> {
    let response: BybitResponse = parse(value)?;
    if response.ret_code != 0 {
        return Err(classify_error(response.ret_code, &response.ret_msg));
    }
    Ok(response)
}

/// Pair each batch ack with its status from `retExtInfo.list`.
pub fn unwrap_batch(value: Value) -> Result<Vec<Result<BybitOrderAck, ExchangeError>>, ExchangeError> {
    let response = envelope(value)?;
    let acks: BybitList<BybitOrderAck> = parse(response.result)?;
    let statuses: Vec<BybitItemStatus> = response
        .ret_ext_info
        .get("list")
        .cloned()
        .map(parse)
        .transpose()?
        .unwrap_or_default();

    Ok(acks
        .list
        .into_iter()
        .enumerate()
        .map(|(i, ack)| match statuses.get(i) {
            Some(status) if status.code != 0 => Err(classify_error(status.code, &status.msg)),
            _ => Ok(ack),
        })
        .collect())
}

fn map_error(error: ExchangeError) -> ExchangeError {
    remap_http_error(error, |body: BybitResponse| {
        classify_error(body.ret_code, &body.ret_msg)
    })
}

fn to_body(value: &Value) -> Result<Vec<u8>, ExchangeError> {
    serde_json::to_vec(value)
        .map_err(|e| ExchangeError::SerializationError(format!("Failed to serialize Bybit body: {}", e)))
}

/// Bybit v5 REST API, linear category
#[derive(Debug, Clone)]
pub struct BybitRest<R: RestClient> {
    rest: R,
}

impl<R: RestClient> BybitRest<R> {
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
        let body = body.map(to_body).transpose()?.unwrap_or_default();
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
        parse(envelope(value)?.result)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        auth: Auth,
    ) -> Result<Vec<T>, ExchangeError> {
        let list: BybitList<T> = self.call(Method::GET, endpoint, params, None, auth).await?;
        Ok(list.list)
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol))]
    pub async fn get_instrument(&self, symbol: &str) -> Result<BybitInstrument, ExchangeError> {
        let instruments: Vec<BybitInstrument> = self
            .list(
                "/v5/market/instruments-info",
                &[("category", CATEGORY), ("symbol", symbol)],
                Auth::Public,
            )
            .await?;
        instruments
            .into_iter()
            .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| ExchangeError::UnsupportedSymbol(symbol.to_string()))
    }

    #[instrument(skip(self, order), fields(exchange = "bybit"))]
    pub async fn place_order(&self, order: &Value) -> Result<BybitOrderAck, ExchangeError> {
        self.call(Method::POST, "/v5/order/create", &[], Some(order), Auth::Signed)
            .await
    }

    #[instrument(skip(self, orders), fields(exchange = "bybit", count = orders.len()))]
    pub async fn place_batch(
        &self,
        orders: &[Value],
    ) -> Result<Vec<Result<BybitOrderAck, ExchangeError>>, ExchangeError> {
        let body = json!({ "category": CATEGORY, "request": orders });
        let value = self
            .raw(Method::POST, "/v5/order/create-batch", &[], Some(&body), Auth::Signed)
            .await?;
        unwrap_batch(value)
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol, order_id = %order_id))]
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<BybitOrderAck, ExchangeError> {
        let body = json!({ "category": CATEGORY, "symbol": symbol, "orderId": order_id });
        self.call(Method::POST, "/v5/order/cancel", &[], Some(&body), Auth::Signed)
            .await
    }

    #[instrument(skip(self, order_ids), fields(exchange = "bybit", symbol = %symbol, count = order_ids.len()))]
    pub async fn cancel_batch(
        &self,
        symbol: &str,
        order_ids: &[String],
    ) -> Result<Vec<Result<BybitOrderAck, ExchangeError>>, ExchangeError> {
        let request: Vec<Value> = order_ids
            .iter()
            .map(|id| json!({ "symbol": symbol, "orderId": id }))
            .collect();
        let body = json!({ "category": CATEGORY, "request": request });
        let value = self
            .raw(Method::POST, "/v5/order/cancel-batch", &[], Some(&body), Auth::Signed)
            .await?;
        unwrap_batch(value)
    }

    /// Looks in the live book first, then in order history.
    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol, order_id = %order_id))]
    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Result<BybitOrder, ExchangeError> {
        let params = [("category", CATEGORY), ("symbol", symbol), ("orderId", order_id)];
        let live: Vec<BybitOrder> = self.list("/v5/order/realtime", &params, Auth::Signed).await?;
        if let Some(order) = live.into_iter().next() {
            return Ok(order);
        }
        let history: Vec<BybitOrder> = self.list("/v5/order/history", &params, Auth::Signed).await?;
        history
            .into_iter()
            .next()
            .ok_or_else(|| classify_error(110001, "Order does not exist."))
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol))]
    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<BybitOrder>, ExchangeError> {
        self.list(
            "/v5/order/realtime",
            &[("category", CATEGORY), ("symbol", symbol), ("openOnly", "0"), ("limit", "50")],
            Auth::Signed,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bybit"))]
    pub async fn get_wallet(&self) -> Result<BybitWallet, ExchangeError> {
        let wallets: Vec<BybitWallet> = self
            .list(
                "/v5/account/wallet-balance",
                &[("accountType", "UNIFIED")],
                Auth::Signed,
            )
            .await?;
        wallets.into_iter().next().ok_or_else(|| {
            ExchangeError::DeserializationError("Bybit returned no wallet".to_string())
        })
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol))]
    pub async fn get_positions(&self, symbol: &str) -> Result<Vec<BybitPosition>, ExchangeError> {
        self.list(
            "/v5/position/list",
            &[("category", CATEGORY), ("symbol", symbol)],
            Auth::Signed,
        )
        .await
    }

    /// Newest first, as Bybit returns them.
    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol, interval = %interval))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<BybitKlineRow>, ExchangeError> {
        let limit = limit.min(MAX_KLINES).to_string();
        self.list(
            "/v5/market/kline",
            &[
                ("category", CATEGORY),
                ("symbol", symbol),
                ("interval", interval),
                ("limit", &limit),
            ],
            Auth::Public,
        )
        .await
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %symbol))]
    pub async fn get_ticker(&self, symbol: &str) -> Result<BybitTicker, ExchangeError> {
        let tickers: Vec<BybitTicker> = self
            .list(
                "/v5/market/tickers",
                &[("category", CATEGORY), ("symbol", symbol)],
                Auth::Public,
            )
            .await?;
        tickers
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::UnsupportedSymbol(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_is_classified() {
        let err = envelope(json!({
            "retCode": 110007,
            "retMsg": "ab not enough for new order",
            "result": {},
            "retExtInfo": {}
        }))
        .unwrap_err();
        assert!(err.is_insufficient_margin());
        assert!(err.to_string().contains("110007"));
    }

    #[test]
    fn test_batch_pairs_acks_with_statuses() {
        let items = unwrap_batch(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {"list": [
                {"category": "linear", "symbol": "BTCUSDT", "orderId": "a1", "orderLinkId": "x1"},
                {"category": "linear", "symbol": "BTCUSDT", "orderId": "", "orderLinkId": ""}
            ]},
            "retExtInfo": {"list": [
                {"code": 0, "msg": "OK"},
                {"code": 110001, "msg": "order not exists or too late to cancel"}
            ]}
        }))
        .unwrap();
        assert_eq!(items[0].as_ref().unwrap().order_id, "a1");
        assert!(items[1].as_ref().unwrap_err().is_order_not_found());
    }

    #[test]
    fn test_http_error_body_is_reclassified() {
        let transport = ExchangeError::api(
            "403",
            r#"{"retCode":10003,"retMsg":"API key is invalid.","result":{},"retExtInfo":{}}"#,
            ApiErrorKind::Auth,
        );
        assert!(matches!(map_error(transport), ExchangeError::ApiError { ref code, .. } if code == "10003"));
    }
}
