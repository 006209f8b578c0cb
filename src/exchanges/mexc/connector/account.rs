use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::json_frame;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::mexc::codec::MexcOrderCodec;
use crate::exchanges::mexc::conversions::{convert_balance, convert_position};
use crate::exchanges::mexc::rest::MexcRest;
use crate::exchanges::mexc::signer::MexcSigner;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

struct LoginConnector {
    signer: Arc<MexcSigner>,
    ws_url: String,
}

#[async_trait]
impl StreamConnector for LoginConnector {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let login = self.signer.ws_login(now)?;
        Ok(StreamPlan::login(self.ws_url.clone(), json_frame(&login)))
    }
}

pub struct Account<R: RestClient> {
    rest: MexcRest<R>,
    instrument: Arc<Instrument>,
    signer: Arc<MexcSigner>,
    ws_url: String,
    orders: StreamSlot<MexcOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, signer: Arc<MexcSigner>, ws_url: String) -> Self {
        Self {
            rest: MexcRest::new(rest.clone()),
            instrument,
            signer,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let asset = self.rest.get_asset(&self.instrument.info.quote_asset).await?;
        let positions = self.get_positions().await?;
        Ok(AccountSnapshot {
            total_wallet_balance: asset.equity - asset.unrealized,
            total_margin_balance: asset.equity,
            available_balance: asset.available_balance,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let positions = self.rest.get_open_positions(&self.instrument.native).await?;
        Ok(retain_open_positions(
            positions
                .iter()
                .filter(|p| self.instrument.is_native(&p.symbol))
                .map(|p| convert_position(p, &self.instrument))
                .collect(),
        ))
    }

    #[instrument(skip(self), fields(exchange = "mexc", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let asset = self.rest.get_asset(&self.instrument.info.quote_asset).await?;
        Ok(convert_balance(&asset))
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let connector = LoginConnector {
            signer: Arc::clone(&self.signer),
            ws_url: self.ws_url.clone(),
        };
        let session = StreamSession::new(
            format!("mexc/orders/{}", self.instrument.symbol),
            MexcOrderCodec::new(Arc::clone(&self.instrument)),
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
