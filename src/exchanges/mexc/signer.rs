use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{body_str, hmac_sha256_hex, sorted_query};
use crate::core::kernel::{SignedRequest, Signer};
use serde_json::{json, Value};

/// MEXC contract API: HMAC-SHA256 hex over `apiKey + reqTime + params`,
/// where `params` is the JSON body for writes and the key-sorted query
/// string otherwise.
pub struct MexcSigner {
    credentials: Credentials,
}

impl MexcSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    fn sign(&self, timestamp: &str, params: &str) -> Result<String, ExchangeError> {
        hmac_sha256_hex(
            &self.credentials.secret_key,
            &format!("{}{}{}", self.credentials.api_key, timestamp, params),
        )
    }

    /// `login` frame of the contract WebSocket; `reqTime` is in milliseconds.
    pub fn ws_login(&self, req_time: u64) -> Result<Value, ExchangeError> {
        let req_time = req_time.to_string();
        let signature = self.sign(&req_time, "")?;
        Ok(json!({
            "method": "login",
            "param": {
                "apiKey": self.credentials.api_key,
                "reqTime": req_time,
                "signature": signature
            }
        }))
    }
}

impl Signer for MexcSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let timestamp = timestamp.to_string();
        let params = if body.is_empty() {
            sorted_query(query_string)
        } else {
            body_str(body)?.to_string()
        };
        let signature = self.sign(&timestamp, &params)?;

        Ok(SignedRequest::new(query_string)
            .header("ApiKey", self.credentials.api_key.clone())
            .header("Request-Time", timestamp)
            .header("Signature", signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> MexcSigner {
        MexcSigner::new(Credentials {
            api_key: "mx0key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: String::new(),
        })
    }

    #[test]
    fn test_query_is_sorted_before_signing() {
        let signed = signer()
            .sign_request(
                "GET",
                "/api/v1/private/order/list/open_orders/BTC_USDT",
                "page_size=100&page_num=1",
                &[],
                1_700_000_000_000,
            )
            .unwrap();
        let expected =
            hmac_sha256_hex("secret", "mx0key1700000000000page_num=1&page_size=100").unwrap();
        assert_eq!(signed.headers["Signature"], expected);
        assert_eq!(signed.headers["Request-Time"], "1700000000000");
        // The query is sent as given
        assert_eq!(signed.query, "page_size=100&page_num=1");
    }

    #[test]
    fn test_body_is_signed_verbatim() {
        let body = br#"{"symbol":"BTC_USDT","vol":1}"#;
        let signed = signer()
            .sign_request("POST", "/api/v1/private/order/submit", "", body, 1)
            .unwrap();
        let expected =
            hmac_sha256_hex("secret", r#"mx0key1{"symbol":"BTC_USDT","vol":1}"#).unwrap();
        assert_eq!(signed.headers["Signature"], expected);
        assert_eq!(signed.headers["ApiKey"], "mx0key");
    }

    #[test]
    fn test_ws_login_signs_key_and_time() {
        let login = signer().ws_login(1_611_038_237_237).unwrap();
        assert_eq!(login["method"], "login");
        assert_eq!(login["param"]["reqTime"], "1611038237237");
        let expected = hmac_sha256_hex("secret", "mx0key1611038237237").unwrap();
        assert_eq!(login["param"]["signature"], expected.as_str());
    }
}
