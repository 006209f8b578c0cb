//! MEXC USDT-margined perpetual contracts.
//!
//! There is no futures testnet; `testnet=true` is accepted with a warning
//! and talks to mainnet.

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{MexcKlineCodec, MexcOrderCodec};
pub use connector::{MexcConnector, MexcEndpoints};
pub use rest::MexcRest;
pub use signer::MexcSigner;
