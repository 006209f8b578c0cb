//! BingX standard USDT-margined perpetual swaps.
//!
//! Every socket frame arrives gzip-compressed, and the server's textual
//! `Ping` must be answered with `Pong`.

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{BingxKlineCodec, BingxOrderCodec};
pub use connector::{BingxConnector, BingxEndpoints};
pub use rest::BingxRest;
pub use signer::BingxSigner;
