//! Sequential fallbacks for exchanges without usable batch endpoints.

use crate::core::errors::ExchangeError;
use crate::core::types::{BatchCancelResult, BatchPlaceResult, Order, OrderRequest};
use std::future::Future;
use tracing::warn;

/// Cancel each id in turn. One failure never stops the remaining cancels;
/// "order does not exist" is recorded as already resolved.
pub async fn cancel_sequentially<F, Fut>(
    exchange: &str,
    order_ids: &[String],
    cancel: F,
) -> BatchCancelResult
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), ExchangeError>>,
{
    let mut result = BatchCancelResult::default();
    for order_id in order_ids {
        let outcome = cancel(order_id.clone()).await;
        if let Err(e) = &outcome {
            if !e.is_order_not_found() {
                warn!(exchange, order_id = %order_id, error = %e, "Cancel failed, continuing batch");
            }
        }
        result.record(order_id.clone(), outcome);
    }
    result
}

/// Place each request in turn, collecting successes and the margin flag.
pub async fn place_sequentially<F, Fut>(
    exchange: &str,
    requests: &[OrderRequest],
    place: F,
) -> BatchPlaceResult
where
    F: Fn(OrderRequest) -> Fut,
    Fut: Future<Output = Result<Order, ExchangeError>>,
{
    let mut result = BatchPlaceResult::default();
    for (index, request) in requests.iter().enumerate() {
        let outcome = place(request.clone()).await;
        if let Err(e) = &outcome {
            warn!(exchange, index, error = %e, "Order placement failed, continuing batch");
        }
        result.record(index, outcome);
    }
    result
}

/// Per-item copy of a whole-request error; application errors keep their kind.
fn item_error(error: &ExchangeError) -> ExchangeError {
    match error {
        ExchangeError::ApiError {
            code,
            message,
            kind,
        } => ExchangeError::api(code.clone(), message.clone(), *kind),
        other => ExchangeError::Other(other.to_string()),
    }
}

/// Mark every id of a chunk as failed when the whole request failed.
pub fn fail_chunk(result: &mut BatchCancelResult, ids: &[String], error: &ExchangeError) {
    for id in ids {
        result.record(id.clone(), Err(item_error(error)));
    }
}

/// Mark every request of a placement chunk as failed.
pub fn fail_place_chunk(
    result: &mut BatchPlaceResult,
    indices: impl IntoIterator<Item = usize>,
    error: &ExchangeError,
) {
    for index in indices {
        result.record(index, Err(item_error(error)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ApiErrorKind;
    use crate::core::types::{OrderSide, OrderStatus, OrderType};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_cancel_sequentially_tolerates_missing_orders() {
        let ids: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        let attempts = Mutex::new(Vec::new());

        let result = cancel_sequentially("test", &ids, |id| {
            attempts.lock().unwrap().push(id.clone());
            async move {
                if id == "3" || id == "7" {
                    Err(ExchangeError::api(
                        "ORDER_NOT_FOUND",
                        "order does not exist",
                        ApiErrorKind::OrderNotFound,
                    ))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(attempts.lock().unwrap().len(), 10);
        assert_eq!(result.canceled.len(), 8);
        assert_eq!(result.already_resolved, vec!["3".to_string(), "7".to_string()]);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn test_place_sequentially_flags_margin() {
        let calls = AtomicUsize::new(0);
        let requests = vec![
            OrderRequest::limit(OrderSide::Buy, Decimal::ONE, Decimal::TEN),
            OrderRequest::limit(OrderSide::Buy, Decimal::ONE, Decimal::TEN),
            OrderRequest::limit(OrderSide::Sell, Decimal::ONE, Decimal::TEN),
        ];

        let result = place_sequentially("test", &requests, |req| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 1 {
                    return Err(ExchangeError::api(
                        "-2019",
                        "Margin is insufficient.",
                        ApiErrorKind::InsufficientMargin,
                    ));
                }
                Ok(Order {
                    order_id: n.to_string(),
                    client_order_id: String::new(),
                    symbol: "BTCUSDT".to_string(),
                    side: req.side,
                    order_type: OrderType::Limit,
                    price: Decimal::TEN,
                    quantity: req.quantity,
                    executed_quantity: Decimal::ZERO,
                    average_price: Decimal::ZERO,
                    status: OrderStatus::New,
                    created_at: 0,
                    updated_at: 0,
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.placed.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, 1);
        assert!(result.margin_insufficient);
    }

    #[test]
    fn test_failed_chunks_keep_error_kind() {
        let mut placed = BatchPlaceResult::default();
        let margin = ExchangeError::api("-2019", "Margin is insufficient.", ApiErrorKind::InsufficientMargin);
        fail_place_chunk(&mut placed, 5..8, &margin);
        assert_eq!(placed.failed.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![5, 6, 7]);
        assert!(placed.margin_insufficient);

        let mut canceled = BatchCancelResult::default();
        let ids = vec!["1".to_string(), "2".to_string()];
        fail_chunk(&mut canceled, &ids, &ExchangeError::NetworkError("reset".to_string()));
        assert_eq!(canceled.failed.len(), 2);
        assert!(matches!(canceled.failed[0].1, ExchangeError::Other(ref m) if m.contains("reset")));
    }
}
