use omnigate::core::config::ConfigError;
use omnigate::{AdapterRegistry, ExchangeError, ExchangeKind, StreamState, SymbolInfo};
use std::collections::HashMap;

/// Credentials for every exchange, pointed at a closed local port so the
/// metadata fetch fails immediately.
fn offline_config(passphrase: bool) -> HashMap<String, String> {
    let mut config = HashMap::from([
        ("api_key".to_string(), "test_api_key".to_string()),
        ("secret_key".to_string(), "test_secret_key".to_string()),
        ("testnet".to_string(), "true".to_string()),
        ("base_url".to_string(), "http://127.0.0.1:1".to_string()),
    ]);
    if passphrase {
        config.insert("passphrase".to_string(), "test_passphrase".to_string());
    }
    config
}

#[tokio::test]
async fn test_every_exchange_builds_offline_with_default_precision() {
    for kind in ExchangeKind::ALL {
        let adapter = AdapterRegistry::create(kind, &offline_config(true), "ETHUSDT")
            .await
            .unwrap_or_else(|e| panic!("{} failed to build: {}", kind, e));

        assert_eq!(adapter.name(), kind.as_str());
        assert_eq!(adapter.symbol(), "ETHUSDT");
        assert_eq!(adapter.base_asset(), "ETH");
        assert_eq!(adapter.quote_asset(), "USDT");
        assert_eq!(adapter.price_decimals(), SymbolInfo::DEFAULT_PRICE_DECIMALS, "{}", kind);
        assert_eq!(adapter.quantity_decimals(), SymbolInfo::DEFAULT_QUANTITY_DECIMALS, "{}", kind);
        assert_eq!(adapter.order_stream_state(), StreamState::Idle);
        assert_eq!(adapter.kline_stream_state(), StreamState::Idle);
    }
}

#[tokio::test]
async fn test_passphrase_exchanges_refuse_to_build_without_one() {
    for kind in ExchangeKind::ALL {
        let result = AdapterRegistry::create(kind, &offline_config(false), "BTCUSDT").await;
        if kind.requires_passphrase() {
            let err = result.err().unwrap_or_else(|| panic!("{} built without passphrase", kind));
            assert!(
                matches!(
                    err,
                    ExchangeError::ConfigError(ConfigError::MissingCredential { key: "passphrase", .. })
                ),
                "{}: {}",
                kind,
                err
            );
        } else {
            assert!(result.is_ok(), "{} should not need a passphrase", kind);
        }
    }
}

#[tokio::test]
async fn test_unsupported_symbol_is_rejected() {
    let err = AdapterRegistry::create(ExchangeKind::Binance, &offline_config(false), "NOTASYMBOL")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ExchangeError::UnsupportedSymbol(_)));
}

#[tokio::test]
async fn test_registry_keeps_adapters_per_exchange_and_symbol() {
    let mut registry = AdapterRegistry::new();
    assert!(registry.is_empty());

    registry
        .add(ExchangeKind::Bybit, &offline_config(false), "BTCUSDT")
        .await
        .unwrap();
    registry
        .add(ExchangeKind::Gate, &offline_config(false), "BTCUSDT")
        .await
        .unwrap();
    registry
        .add(ExchangeKind::Gate, &offline_config(false), "ethusdt")
        .await
        .unwrap();

    assert_eq!(registry.len(), 3);
    assert_eq!(
        registry.keys(),
        vec![
            (ExchangeKind::Bybit, "BTCUSDT".to_string()),
            (ExchangeKind::Gate, "BTCUSDT".to_string()),
            (ExchangeKind::Gate, "ETHUSDT".to_string()),
        ]
    );
    let gate = registry.get(ExchangeKind::Gate, "ethusdt").unwrap();
    assert_eq!(gate.name(), "gate");
    assert!(registry.get(ExchangeKind::Okx, "BTCUSDT").is_none());

    registry.shutdown().await;
    assert!(registry.remove(ExchangeKind::Bybit, "BTCUSDT").is_some());
    assert_eq!(registry.len(), 2);
}
