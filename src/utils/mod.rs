pub mod client_id;
pub mod exchange_factory;

pub use client_id::ClientOrderIdGenerator;
pub use exchange_factory::{AdapterRegistry, ExchangeKind};
