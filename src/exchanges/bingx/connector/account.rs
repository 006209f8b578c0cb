use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::bingx::codec::BingxOrderCodec;
use crate::exchanges::bingx::conversions::{convert_balance, convert_position};
use crate::exchanges::bingx::rest::BingxRest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

/// Listen keys lapse after 60 minutes without an extension.
const LISTEN_KEY_KEEPALIVE: Duration = Duration::from_secs(30 * 60);

/// Creates a listen key per connection and extends the current one.
struct ListenKeyConnector<R: RestClient> {
    rest: BingxRest<R>,
    ws_url: String,
    current: Mutex<Option<String>>,
}

#[async_trait]
impl<R: RestClient + 'static> StreamConnector for ListenKeyConnector<R> {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let listen_key = self.rest.create_listen_key().await?;
        let url = format!("{}?listenKey={}", self.ws_url, listen_key);
        *self.current.lock().await = Some(listen_key);
        Ok(StreamPlan::subscribe(url, Vec::new()))
    }

    async fn keepalive(&self) -> Result<(), ExchangeError> {
        let current = self.current.lock().await.clone();
        match current {
            Some(listen_key) => self.rest.keepalive_listen_key(&listen_key).await,
            None => Ok(()),
        }
    }
}

pub struct Account<R: RestClient> {
    rest: BingxRest<R>,
    instrument: Arc<Instrument>,
    ws_url: String,
    orders: StreamSlot<BingxOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, ws_url: String) -> Self {
        Self {
            rest: BingxRest::new(rest.clone()),
            instrument,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let balance = self.rest.get_balance().await?;
        let positions = self.get_positions().await?;
        Ok(AccountSnapshot {
            total_wallet_balance: balance.balance,
            total_margin_balance: balance.equity,
            available_balance: balance.available_margin,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
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

    #[instrument(skip(self), fields(exchange = "bingx", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let balance = self.rest.get_balance().await?;
        Ok(convert_balance(&balance))
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let connector = ListenKeyConnector {
            rest: self.rest.clone(),
            ws_url: self.ws_url.clone(),
            current: Mutex::new(None),
        };
        let session = StreamSession::new(
            format!("bingx/orders/{}", self.instrument.symbol),
            BingxOrderCodec::new(Arc::clone(&self.instrument)),
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
