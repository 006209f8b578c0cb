use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, StreamSession, StreamSlot, StreamState, WsConfig};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::kucoin::codec::KucoinOrderCodec;
use crate::exchanges::kucoin::connector::bullet::BulletConnector;
use crate::exchanges::kucoin::connector::PING_INTERVAL;
use crate::exchanges::kucoin::conversions::{convert_balance, convert_position};
use crate::exchanges::kucoin::rest::KucoinRest;
use std::sync::Arc;
use tracing::instrument;

pub struct Account<R: RestClient> {
    rest: KucoinRest<R>,
    instrument: Arc<Instrument>,
    orders: StreamSlot<KucoinOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>) -> Self {
        Self {
            rest: KucoinRest::new(rest.clone()),
            instrument,
            orders: StreamSlot::new(),
        }
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let overview = self
            .rest
            .get_account_overview(&self.instrument.info.quote_asset)
            .await?;
        let positions = self.get_positions().await?;
        Ok(AccountSnapshot {
            total_wallet_balance: overview.account_equity - overview.unrealised_pnl,
            total_margin_balance: overview.margin_balance,
            available_balance: overview.available_balance,
            positions,
        })
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let position = self.rest.get_position(&self.instrument.native).await?;
        Ok(retain_open_positions(vec![convert_position(
            &position,
            &self.instrument,
        )]))
    }

    #[instrument(skip(self), fields(exchange = "kucoin", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let overview = self
            .rest
            .get_account_overview(&self.instrument.info.quote_asset)
            .await?;
        Ok(convert_balance(&overview))
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let codec = KucoinOrderCodec::new(Arc::clone(&self.instrument));
        let connector = BulletConnector::new(self.rest.clone(), true, codec.topics());
        let session = StreamSession::new(
            format!("kucoin/orders/{}", self.instrument.symbol),
            codec,
            Arc::new(connector),
            WsConfig::default().with_heartbeat_interval(PING_INTERVAL),
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
