use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::json_frame;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::bybit::codec::BybitOrderCodec;
use crate::exchanges::bybit::conversions::{convert_balance, convert_position};
use crate::exchanges::bybit::rest::BybitRest;
use crate::exchanges::bybit::signer::BybitSigner;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

/// How far in the future the `auth` signature stays valid.
const AUTH_VALIDITY_MS: i64 = 10_000;

struct AuthConnector {
    signer: Arc<BybitSigner>,
    ws_url: String,
}

#[async_trait]
impl StreamConnector for AuthConnector {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let expires = (chrono::Utc::now().timestamp_millis() + AUTH_VALIDITY_MS).max(0) as u64;
        let auth = self.signer.ws_auth(expires)?;
        Ok(StreamPlan::login(self.ws_url.clone(), json_frame(&auth)))
    }
}

/// Account queries and the private order/position/wallet stream.
pub struct Account<R: RestClient> {
    rest: BybitRest<R>,
    instrument: Arc<Instrument>,
    signer: Arc<BybitSigner>,
    ws_url: String,
    orders: StreamSlot<BybitOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, signer: Arc<BybitSigner>, ws_url: String) -> Self {
        Self {
            rest: BybitRest::new(rest.clone()),
            instrument,
            signer,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let wallet = self.rest.get_wallet().await?;
        let positions = self.get_positions().await?;
        Ok(AccountSnapshot {
            total_wallet_balance: wallet.total_wallet_balance,
            total_margin_balance: wallet.total_margin_balance,
            available_balance: wallet.total_available_balance,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
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

    #[instrument(skip(self), fields(exchange = "bybit", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let quote = &self.instrument.info.quote_asset;
        let wallet = self.rest.get_wallet().await?;
        Ok(wallet
            .coin
            .iter()
            .find(|c| c.coin.eq_ignore_ascii_case(quote))
            .map_or_else(
                || Balance {
                    asset: quote.clone(),
                    total: Decimal::ZERO,
                    available: Decimal::ZERO,
                },
                convert_balance,
            ))
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let connector = AuthConnector {
            signer: Arc::clone(&self.signer),
            ws_url: self.ws_url.clone(),
        };
        let session = StreamSession::new(
            format!("bybit/orders/{}", self.instrument.symbol),
            BybitOrderCodec::new(Arc::clone(&self.instrument)),
            Arc::new(connector),
            WsConfig::default(),
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
