//! Bybit v5 linear (USDT) perpetuals.

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{BybitKlineCodec, BybitOrderCodec};
pub use connector::{BybitConnector, BybitEndpoints};
pub use rest::BybitRest;
pub use signer::BybitSigner;
