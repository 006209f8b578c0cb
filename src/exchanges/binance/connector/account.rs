use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::binance::codec::BinanceOrderCodec;
use crate::exchanges::binance::conversions::convert_position;
use crate::exchanges::binance::rest::BinanceRest;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Listen keys expire after 60 minutes without a keep-alive.
const LISTEN_KEY_KEEPALIVE: Duration = Duration::from_secs(30 * 60);

/// Fetches a fresh listen key for every connection and keeps it alive.
struct ListenKeyConnector<R: RestClient> {
    rest: BinanceRest<R>,
    ws_url: String,
}

#[async_trait]
impl<R: RestClient + 'static> StreamConnector for ListenKeyConnector<R> {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let listen_key = self.rest.create_listen_key().await?;
        Ok(StreamPlan::subscribe(
            format!("{}/{}", self.ws_url, listen_key),
            Vec::new(),
        ))
    }

    async fn keepalive(&self) -> Result<(), ExchangeError> {
        self.rest.keepalive_listen_key().await
    }
}

/// Account queries and the user data stream.
pub struct Account<R: RestClient> {
    rest: BinanceRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    orders: StreamSlot<BinanceOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: BinanceRest::new(rest.clone()),
            instrument,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let info = self.rest.get_account_info().await?;
        let positions = self.get_positions().await?;
        Ok(AccountSnapshot {
            total_wallet_balance: info.total_wallet_balance,
            total_margin_balance: info.total_margin_balance,
            available_balance: info.available_balance,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let positions = self.rest.get_positions(&self.instrument.native).await?;
        Ok(retain_open_positions(
            positions
                .iter()
                .filter(|p| self.instrument.is_native(&p.symbol))
                .map(|p| convert_position(p, &self.instrument))
                .collect(),
        ))
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let quote = &self.instrument.info.quote_asset;
        let balances = self.rest.get_balances().await?;
        Ok(balances
            .into_iter()
            .find(|b| b.asset.eq_ignore_ascii_case(quote))
            .map_or_else(
                || Balance {
                    asset: quote.clone(),
                    total: Decimal::ZERO,
                    available: Decimal::ZERO,
                },
                |b| Balance {
                    asset: b.asset,
                    total: b.balance,
                    available: b.available_balance,
                },
            ))
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let connector = ListenKeyConnector {
            rest: self.rest.clone(),
            ws_url: self.ws_url.clone(),
        };
        let session = StreamSession::new(
            format!("binance/orders/{}", self.instrument.symbol),
            BinanceOrderCodec::new(Arc::clone(&self.instrument)),
            Arc::new(connector),
            WsConfig::default().with_keepalive(LISTEN_KEY_KEEPALIVE),
        );
        self.orders.start(session, callback).await
    }

    pub async fn stop_order_stream(&self) -> Result<(), ExchangeError> {
        self.orders.stop().await
    }

    pub fn order_stream_state(&self) -> StreamState {
        self.orders.state()
    }
}
