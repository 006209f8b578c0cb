use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::json_frame;
use crate::core::kernel::{
    RestClient, StreamConnector, StreamPlan, StreamSession, StreamSlot, StreamState, WsConfig,
};
use crate::core::normalize::retain_open_positions;
use crate::core::symbols::Instrument;
use crate::core::traits::UpdateCallback;
use crate::core::types::{Account as AccountSnapshot, Balance, Position};
use crate::exchanges::bitget::codec::BitgetOrderCodec;
use crate::exchanges::bitget::conversions::{convert_balance, convert_position};
use crate::exchanges::bitget::rest::BitgetRest;
use crate::exchanges::bitget::signer::BitgetSigner;
use crate::exchanges::bitget::types::BitgetAccount;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

struct LoginConnector {
    signer: Arc<BitgetSigner>,
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
    rest: BitgetRest<R>,
    instrument: Arc<Instrument>,
    signer: Arc<BitgetSigner>,
    ws_url: String,
    orders: StreamSlot<BitgetOrderCodec>,
}

impl<R: RestClient + Clone + 'static> Account<R> {
    pub fn new(rest: &R, instrument: Arc<Instrument>, signer: Arc<BitgetSigner>, ws_url: String) -> Self {
        Self {
            rest: BitgetRest::new(rest.clone()),
            instrument,
            signer,
            ws_url,
            orders: StreamSlot::new(),
        }
    }

    async fn margin_account(&self) -> Result<Option<BitgetAccount>, ExchangeError> {
        let quote = &self.instrument.info.quote_asset;
        let accounts = self.rest.get_accounts().await?;
        Ok(accounts
            .into_iter()
            .find(|a| a.margin_coin.eq_ignore_ascii_case(quote)))
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let account = self.margin_account().await?;
        let positions = self.get_positions().await?;
        Ok(match account {
            Some(account) => AccountSnapshot {
                total_wallet_balance: account.account_equity - account.unrealized_pl,
                total_margin_balance: account.usdt_equity,
                available_balance: account.available,
                positions,
            },
            None => AccountSnapshot {
                total_wallet_balance: Decimal::ZERO,
                total_margin_balance: Decimal::ZERO,
                available_balance: Decimal::ZERO,
                positions,
            },
        })
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let positions = self
            .rest
            .get_positions(&self.instrument.native, &self.instrument.info.quote_asset)
            .await?;
        Ok(retain_open_positions(
            positions
                .iter()
                .filter(|p| self.instrument.is_native(&p.symbol))
                .map(|p| convert_position(p, &self.instrument))
                .collect(),
        ))
    }

    #[instrument(skip(self), fields(exchange = "bitget", symbol = %self.instrument.symbol))]
    pub async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        Ok(match self.margin_account().await? {
            Some(account) => convert_balance(&account),
            None => Balance {
                asset: self.instrument.info.quote_asset.clone(),
                total: Decimal::ZERO,
                available: Decimal::ZERO,
            },
        })
    }

    pub async fn start_order_stream(&self, callback: UpdateCallback) -> Result<(), ExchangeError> {
        let connector = LoginConnector {
            signer: Arc::clone(&self.signer),
            ws_url: self.ws_url.clone(),
        };
        let session = StreamSession::new(
            format!("bitget/orders/{}", self.instrument.symbol),
            BitgetOrderCodec::new(Arc::clone(&self.instrument)),
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
