use async_trait::async_trait;
use omnigate::core::config::ExchangeConfig;
use omnigate::core::kernel::rest::Auth;
use omnigate::core::kernel::RestClient;
use omnigate::exchanges::kucoin;
use omnigate::{ExchangeAdapter, ExchangeError, SymbolInfo};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scripted KuCoin Futures REST double.
///
/// Contract metadata is unreachable, cancels of ids in `missing` answer
/// "order not exist", and cancels of ids in `broken` fail at the transport.
#[derive(Clone, Default)]
struct ScriptedRest {
    missing: Vec<&'static str>,
    broken: Vec<&'static str>,
    open: Vec<&'static str>,
    cancels: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RestClient for ScriptedRest {
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        _query_params: &[(&str, &str)],
        _body: &[u8],
        _auth: Auth,
    ) -> Result<Value, ExchangeError> {
        if method == Method::DELETE {
            let id = endpoint.rsplit('/').next().unwrap_or_default().to_string();
            self.cancels.lock().unwrap().push(id.clone());
            if self.broken.contains(&id.as_str()) {
                return Err(ExchangeError::NetworkError("connection reset".to_string()));
            }
            if self.missing.contains(&id.as_str()) {
                return Ok(json!({"code": "100004", "msg": "order not exist"}));
            }
            return Ok(json!({"code": "200000", "data": {"cancelledOrderIds": [id]}}));
        }
        if endpoint == "/api/v1/orders" {
            let items: Vec<Value> = self
                .open
                .iter()
                .map(|id| {
                    json!({
                        "id": id, "symbol": "XBTUSDTM", "type": "limit", "side": "buy",
                        "price": "60000", "size": 1, "filledSize": 0, "status": "open",
                        "isActive": true, "createdAt": 1_700_000_000_000_i64
                    })
                })
                .collect();
            return Ok(json!({"code": "200000", "data": {"items": items}}));
        }
        Err(ExchangeError::NetworkError("metadata unavailable".to_string()))
    }
}

async fn adapter(rest: ScriptedRest) -> Arc<dyn ExchangeAdapter> {
    let config = ExchangeConfig::from_map(&HashMap::new());
    Arc::new(
        kucoin::build_connector(rest, &config, "BTCUSDT")
            .await
            .unwrap(),
    )
}

fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|i| i.to_string()).collect()
}

#[tokio::test]
async fn test_missing_orders_do_not_abort_the_batch() {
    let rest = ScriptedRest {
        missing: vec!["3", "7"],
        ..Default::default()
    };
    let adapter = adapter(rest.clone()).await;

    let result = adapter.batch_cancel_orders(&ids(1..=10)).await;

    assert_eq!(*rest.cancels.lock().unwrap(), ids(1..=10));
    assert_eq!(result.canceled.len(), 8);
    assert_eq!(result.already_resolved, vec!["3".to_string(), "7".to_string()]);
    assert!(result.failed.is_empty());
}

#[tokio::test]
async fn test_transport_failures_are_reported_per_order() {
    let rest = ScriptedRest {
        missing: vec!["2"],
        broken: vec!["4"],
        ..Default::default()
    };
    let adapter = adapter(rest.clone()).await;

    let result = adapter.batch_cancel_orders(&ids(1..=5)).await;

    assert_eq!(rest.cancels.lock().unwrap().len(), 5);
    assert_eq!(result.canceled, vec!["1", "3", "5"]);
    assert_eq!(result.already_resolved, vec!["2"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].0, "4");
    assert!(!result.failed[0].1.is_order_not_found());
}

#[tokio::test]
async fn test_cancel_all_cancels_every_listed_order() {
    let rest = ScriptedRest {
        open: vec!["a1", "a2", "a3"],
        missing: vec!["a2"],
        ..Default::default()
    };
    let adapter = adapter(rest.clone()).await;

    let result = adapter.cancel_all_orders().await.unwrap();

    assert_eq!(*rest.cancels.lock().unwrap(), vec!["a1", "a2", "a3"]);
    assert_eq!(result.canceled, vec!["a1", "a3"]);
    assert_eq!(result.already_resolved, vec!["a2"]);
}

#[tokio::test]
async fn test_metadata_failure_falls_back_to_default_precision() {
    let adapter = adapter(ScriptedRest::default()).await;

    assert_eq!(adapter.symbol(), "BTCUSDT");
    assert_eq!(adapter.price_decimals(), SymbolInfo::DEFAULT_PRICE_DECIMALS);
    assert_eq!(adapter.quantity_decimals(), SymbolInfo::DEFAULT_QUANTITY_DECIMALS);
    assert!(adapter.symbol_info().contract_size.is_none());
}
