use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{body_str, hmac_sha256_base64};
use crate::core::kernel::{SignedRequest, Signer};
use serde_json::{json, Value};

/// HMAC-SHA256 base64 over `timestamp + METHOD + requestPath + body`.
pub struct BitgetSigner {
    credentials: Credentials,
    testnet: bool,
}

impl BitgetSigner {
    pub fn new(credentials: Credentials, testnet: bool) -> Self {
        Self {
            credentials,
            testnet,
        }
    }

    /// `login` op for the private WebSocket; the timestamp is in seconds.
    pub fn ws_login(&self, timestamp_secs: u64) -> Result<Value, ExchangeError> {
        let ts = timestamp_secs.to_string();
        let sign = hmac_sha256_base64(
            &self.credentials.secret_key,
            &format!("{}GET/user/verify", ts),
        )?;
        Ok(json!({
            "op": "login",
            "args": [{
                "apiKey": self.credentials.api_key,
                "passphrase": self.credentials.passphrase,
                "timestamp": ts,
                "sign": sign
            }]
        }))
    }
}

impl Signer for BitgetSigner {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let request_path = if query_string.is_empty() {
            endpoint.to_string()
        } else {
            format!("{}?{}", endpoint, query_string)
        };
        let prehash = format!(
            "{}{}{}{}",
            timestamp,
            method.to_uppercase(),
            request_path,
            body_str(body)?
        );
        let signature = hmac_sha256_base64(&self.credentials.secret_key, &prehash)?;

        let mut signed = SignedRequest::new(query_string)
            .header("ACCESS-KEY", self.credentials.api_key.clone())
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp.to_string())
            .header("ACCESS-PASSPHRASE", self.credentials.passphrase.clone())
            .header("locale", "en-US");
        if self.testnet {
            signed = signed.header("paptrading", "1");
        }
        Ok(signed)
    }
}
