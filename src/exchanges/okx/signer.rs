use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{body_str, hmac_sha256_base64};
use crate::core::kernel::{SignedRequest, Signer};
use serde_json::{json, Value};

/// HMAC-SHA256 base64 over `timestamp + METHOD + requestPath + body`.
pub struct OkxSigner {
    credentials: Credentials,
    testnet: bool,
}

impl OkxSigner {
    pub fn new(credentials: Credentials, testnet: bool) -> Self {
        Self {
            credentials,
            testnet,
        }
    }

    /// OKX wants ISO-8601 with milliseconds, e.g. `2020-12-08T09:08:57.715Z`.
    pub fn iso_timestamp(timestamp_ms: u64) -> Result<String, ExchangeError> {
        let datetime = chrono::DateTime::from_timestamp_millis(timestamp_ms as i64)
            .ok_or_else(|| ExchangeError::AuthError("Invalid timestamp".to_string()))?;
        Ok(datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }

    /// `login` op for the private WebSocket; the timestamp is in seconds.
    pub fn ws_login(&self, timestamp_secs: u64) -> Result<Value, ExchangeError> {
        let ts = timestamp_secs.to_string();
        let sign = hmac_sha256_base64(
            &self.credentials.secret_key,
            &format!("{}GET/users/self/verify", ts),
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

impl Signer for OkxSigner {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let timestamp = Self::iso_timestamp(timestamp)?;
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
            .header("OK-ACCESS-KEY", self.credentials.api_key.clone())
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", self.credentials.passphrase.clone());
        if self.testnet {
            signed = signed.header("x-simulated-trading", "1");
        }
        Ok(signed)
    }
}
