use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::gate::codec::{private_subscription, GateOrderCodec, BALANCES, ORDERS, POSITIONS};
use crate::exchanges::gate::conversions::{convert_balance, convert_position};
use crate::exchanges::gate::rest::GateRest;
use crate::exchanges::gate::signer::GateSigner;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::instrument;

/// Private channels are keyed by user id, looked up once from the account.
struct UserChannels<R: RestClient> {
    rest: GateRest<R>,
    signer: Arc<GateSigner>,
    contract: String,
    ws_url: String,
    user_id: OnceCell<String>,
}

#[async_trait]
impl<R: RestClient + Clone + 'static> StreamConnector for UserChannels<R> {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let user = self
            .user_id
            .get_or_try_init(|| async { self.rest.get_account().await.map(|a| a.user) })
            .await?;
        let frames = vec![
            private_subscription(&self.signer, ORDERS, &[user.clone(), self.contract.clone()])?,
            private_subscription(&self.signer, POSITIONS, &[user.clone(), self.contract.clone()])?,
            private_subscription(&self.signer, BALANCES, &[user.clone()])?,
        ];
        Ok(StreamPlan::subscribe(self.ws_url.clone(), frames))
    }
}

pub struct Account<R: RestClient> {
    rest: GateRest<R>,
    instrument: Arc<Instrument>,
    signer: Arc<GateSigner>,
    ws_url: String,
    orders: StreamSlot<GateOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, signer: Arc<GateSigner>, ws_url: String) -> Self {
        Self {
            rest: GateRest::new(rest.clone()),
            instrument,
            signer,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let account = self.rest.get_account().await?;
        let positions = self.get_positions().await?;
        Ok(AccountSnapshot {
            total_wallet_balance: account.total,
            total_margin_balance: account.total + account.unrealised_pnl,
            available_balance: account.available,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let position = self.rest.get_position(&self.instrument.native).await?;
        Ok(retain_open_positions(vec![convert_position(
            &position,
            &self.instrument,
        )]))
    }

    #[instrument(skip(self), fields(exchange = "gate", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let account = self.rest.get_account().await?;
        Ok(convert_balance(&account))
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let connector = UserChannels {
            rest: self.rest.clone(),
            signer: Arc::clone(&self.signer),
            contract: self.instrument.native.clone(),
            ws_url: self.ws_url.clone(),
            user_id: OnceCell::new(),
        };
        let session = StreamSession::new(
            format!("gate/orders/{}", self.instrument.symbol),
            GateOrderCodec::new(Arc::clone(&self.instrument), Arc::clone(&self.signer)),
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
