use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{hmac_sha512_hex, sha512_hex};
use crate::core::kernel::{SignedRequest, Signer};
use serde_json::{json, Value};

/// Gate APIv4: HMAC-SHA512 hex over
/// `METHOD\npath\nquery\nhex(sha512(body))\ntimestamp_secs`.
pub struct GateSigner {
    credentials: Credentials,
}

impl GateSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// `auth` block attached to a private channel subscription.
    pub fn ws_auth(&self, channel: &str, event: &str, time_secs: u64) -> Result<Value, ExchangeError> {
        let sign = hmac_sha512_hex(
            &self.credentials.secret_key,
            &format!("channel={}&event={}&time={}", channel, event, time_secs),
        )?;
        Ok(json!({
            "method": "api_key",
            "KEY": self.credentials.api_key,
            "SIGN": sign
        }))
    }
}

impl Signer for GateSigner {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let timestamp_secs = (timestamp / 1000).to_string();
        let prehash = format!(
            "{}\n{}\n{}\n{}\n{}",
            method.to_uppercase(),
            endpoint,
            query_string,
            sha512_hex(body),
            timestamp_secs
        );
        let signature = hmac_sha512_hex(&self.credentials.secret_key, &prehash)?;

        Ok(SignedRequest::new(query_string)
            .header("KEY", self.credentials.api_key.clone())
            .header("SIGN", signature)
            .header("Timestamp", timestamp_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> GateSigner {
        GateSigner::new(Credentials {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: String::new(),
        })
    }

    #[test]
    fn test_timestamp_is_in_seconds() {
        let signed = signer()
            .sign_request("GET", "/api/v4/futures/usdt/orders", "contract=BTC_USDT&status=open", &[], 1_700_000_000_123)
            .unwrap();
        assert_eq!(signed.headers["Timestamp"], "1700000000");
        assert_eq!(signed.query, "contract=BTC_USDT&status=open");

        let expected = hmac_sha512_hex(
            "secret",
            &format!(
                "GET\n/api/v4/futures/usdt/orders\ncontract=BTC_USDT&status=open\n{}\n1700000000",
                sha512_hex(b"")
            ),
        )
        .unwrap();
        assert_eq!(signed.headers["SIGN"], expected);
    }

    #[test]
    fn test_body_hash_changes_signature() {
        let a = signer().sign_request("POST", "/p", "", b"{\"size\":1}", 1_000).unwrap();
        let b = signer().sign_request("POST", "/p", "", b"{\"size\":2}", 1_000).unwrap();
        assert_ne!(a.headers["SIGN"], b.headers["SIGN"]);
        assert_eq!(a, signer().sign_request("POST", "/p", "", b"{\"size\":1}", 1_000).unwrap());
    }

    #[test]
    fn test_ws_auth_signs_channel_event_time() {
        let auth = signer().ws_auth("futures.orders", "subscribe", 1_700_000_000).unwrap();
        let expected = hmac_sha512_hex(
            "secret",
            "channel=futures.orders&event=subscribe&time=1700000000",
        )
        .unwrap();
        assert_eq!(auth["SIGN"], expected);
        assert_eq!(auth["KEY"], "key");
    }
}
