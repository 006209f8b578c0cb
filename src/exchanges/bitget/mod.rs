//! Bitget USDT-M futures (v2 mix API).

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{BitgetKlineCodec, BitgetOrderCodec};
pub use connector::{BitgetConnector, BitgetEndpoints};
pub use rest::BitgetRest;
pub use signer::BitgetSigner;
