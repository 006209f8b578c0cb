use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::json_frame;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::okx::codec::OkxOrderCodec;
use crate::exchanges::okx::conversions::{convert_balance, convert_position};
use crate::exchanges::okx::rest::OkxRest;
use crate::exchanges::okx::signer::OkxSigner;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

/// Signs a fresh `login` op for every connection attempt.
struct LoginConnector {
    signer: Arc<OkxSigner>,
    ws_url: String,
}

#[async_trait]
impl StreamConnector for LoginConnector {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let login = self.signer.ws_login(now)?;
        Ok(StreamPlan::login(self.ws_url.clone(), json_frame(&login)))
    }
}

/// Account queries and the private order/position/balance stream.
pub struct Account<R: RestClient> {
    rest: OkxRest<R>,
    instrument: Arc<Instrument>,
    signer: Arc<OkxSigner>,
    ws_url: String,
    orders: StreamSlot<OkxOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, signer: Arc<OkxSigner>, ws_url: String) -> Self {
        Self {
            rest: OkxRest::new(rest.clone()),
            instrument,
            signer,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let balance = self.rest.get_balance().await?;
        let positions = self.get_positions().await?;
        let quote = &self.instrument.info.quote_asset;
        let available = balance
            .details
            .iter()
            .find(|d| d.ccy.eq_ignore_ascii_case(quote))
            .map_or(Decimal::ZERO, |d| convert_balance(d).available);
        Ok(AccountSnapshot {
            total_wallet_balance: balance.total_eq,
            total_margin_balance: balance.adj_eq.unwrap_or(balance.total_eq),
            available_balance: available,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let positions = self.rest.get_positions(&self.instrument.native).await?;
        Ok(retain_open_positions(
            positions
                .iter()
                .filter(|p| self.instrument.is_native(&p.inst_id))
                .map(|p| convert_position(p, &self.instrument))
                .collect(),
        ))
    }

    #[instrument(skip(self), fields(exchange = "okx", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let quote = &self.instrument.info.quote_asset;
        let balance = self.rest.get_balance().await?;
        Ok(balance
            .details
            .iter()
            .find(|d| d.ccy.eq_ignore_ascii_case(quote))
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
        let connector = LoginConnector {
            signer: Arc::clone(&self.signer),
            ws_url: self.ws_url.clone(),
        };
        let session = StreamSession::new(
            format!("okx/orders/{}", self.instrument.symbol),
            OkxOrderCodec::new(Arc::clone(&self.instrument)),
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
