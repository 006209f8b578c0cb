//! Binance USD-M perpetual futures.

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{BinanceKlineCodec, BinanceOrderCodec};
pub use connector::{BinanceConnector, BinanceEndpoints};
pub use rest::BinanceRest;
pub use signer::BinanceSigner;
