//! KuCoin Futures USDT-margined perpetuals.
//!
//! Contracts are quoted in lots (`multiplier` base units each) and BTC is
//! listed as `XBT`, e.g. `XBTUSDTM`.

pub mod builder;
pub mod codec;
pub mod connector;
pub mod conversions;
pub mod rest;
pub mod signer;
pub mod types;

pub use builder::{build_adapter, build_connector};
pub use codec::{KucoinKlineCodec, KucoinOrderCodec};
pub use connector::KucoinConnector;
pub use rest::KucoinRest;
pub use signer::KucoinSigner;
