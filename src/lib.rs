//! Unified adapters for USDT-margined perpetual futures on Binance, Bybit,
//! OKX, Bitget, Gate.io, KuCoin, MEXC and BingX.
//!
//! Every exchange is exposed through [`ExchangeAdapter`]; build one with the
//! exchange's `build_adapter` or through [`AdapterRegistry`].

pub mod core;
pub mod exchanges;
pub mod utils;

pub use crate::core::{
    errors::{ApiErrorKind, ExchangeError},
    kernel::StreamState,
    traits::{CandleCallback, ExchangeAdapter, UpdateCallback},
    types::*,
};
pub use crate::exchanges::binance::BinanceConnector;
pub use crate::exchanges::bingx::BingxConnector;
pub use crate::exchanges::bitget::BitgetConnector;
pub use crate::exchanges::bybit::BybitConnector;
pub use crate::exchanges::gate::GateConnector;
pub use crate::exchanges::kucoin::KucoinConnector;
pub use crate::exchanges::mexc::MexcConnector;
pub use crate::exchanges::okx::OkxConnector;
pub use crate::utils::{AdapterRegistry, ClientOrderIdGenerator, ExchangeKind};
