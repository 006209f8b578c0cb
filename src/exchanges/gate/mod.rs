//! Gate USDT-settled perpetual futures (APIv4).

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{GateKlineCodec, GateOrderCodec};
pub use connector::{GateConnector, GateEndpoints};
pub use rest::GateRest;
pub use signer::GateSigner;
