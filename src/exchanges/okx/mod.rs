//! OKX USDT-margined perpetual swaps (v5 API).

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{OkxKlineCodec, OkxOrderCodec};
pub use connector::{OkxConnector, OkxEndpoints};
pub use rest::OkxRest;
pub use signer::OkxSigner;
