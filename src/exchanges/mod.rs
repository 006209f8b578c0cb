pub mod binance;
pub mod bingx;
pub mod bitget;
pub mod bybit;
pub mod gate;
pub mod kucoin;
pub mod mexc;
pub mod okx;
