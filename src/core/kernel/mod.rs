/// Kernel: the exchange-agnostic transport layer
///
/// Everything under this module is shared by every exchange and contains no
/// exchange-specific logic.
///
/// ## Transport Layer
/// - `RestClient`: Unified HTTP client interface, `ReqwestRest` in production
/// - `StreamSession`: supervised WebSocket stream with reconnect and heartbeat
///
/// ## Authentication
/// - `Signer`: Pluggable request signing; each exchange provides one
///
/// ## Message Handling
/// - `WsCodec`: Exchange-specific frame decoding into `Decoded` actions
/// - `StreamConnector`: Exchange-specific connection preparation (URL, login)
///
/// # Usage
///
/// ```rust,no_run
/// use omnigate::core::kernel::*;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rest_config = RestClientConfig::new(
///     "https://www.okx.com".to_string(),
///     "okx".to_string(),
/// );
/// let rest = RestClientBuilder::new(rest_config).build()?;
/// let instruments = rest
///     .get("/api/v5/public/instruments", &[("instType", "SWAP")], false)
///     .await?;
/// # let _ = instruments;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod stream;
pub mod ws;

// Re-export key types for convenience
pub use codec::{Decoded, WsCodec};
pub use rest::{Auth, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{SignatureResult, SignedRequest, Signer};
pub use stream::{EventHandler, FixedPlan, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState};
pub use ws::WsConfig;
