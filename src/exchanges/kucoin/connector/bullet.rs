use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, StreamConnector, StreamPlan};
use crate::exchanges::kucoin::codec::subscribe_frame;
use crate::exchanges::kucoin::rest::KucoinRest;
use async_trait::async_trait;
use rand::Rng;

/// Fetches a fresh push-service token before every connection.
pub struct BulletConnector<R: RestClient> {
    rest: KucoinRest<R>,
    private: bool,
    topics: Vec<String>,
}

impl<R: RestClient> BulletConnector<R> {
    pub fn new(rest: KucoinRest<R>, private: bool, topics: Vec<String>) -> Self {
        Self {
            rest,
            private,
            topics,
        }
    }
}

#[async_trait]
impl<R: RestClient + 'static> StreamConnector for BulletConnector<R> {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        let bullet = self.rest.get_bullet(self.private).await?;
        let server = bullet.instance_servers.first().ok_or_else(|| {
            ExchangeError::WebSocketError("KuCoin returned no push servers".to_string())
        })?;
        let connect_id: u64 = rand::thread_rng().gen();
        let url = format!(
            "{}?token={}&connectId={}",
            server.endpoint, bullet.token, connect_id
        );
        let frames = self
            .topics
            .iter()
            .enumerate()
            .map(|(id, topic)| subscribe_frame(id + 1, topic, self.private))
            .collect();
        Ok(StreamPlan::subscribe(url, frames))
    }
}
