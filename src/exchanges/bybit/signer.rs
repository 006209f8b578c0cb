use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{body_str, hmac_sha256_hex};
use crate::core::kernel::{SignedRequest, Signer};
use serde_json::{json, Value};

pub const RECV_WINDOW: &str = "5000";

/// Bybit v5: HMAC-SHA256 hex over `timestamp + apiKey + recvWindow + payload`,
/// where the payload is the query string for GET and the raw body otherwise.
pub struct BybitSigner {
    credentials: Credentials,
}

impl BybitSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// `auth` op for the private WebSocket; `expires_ms` must lie in the future.
    pub fn ws_auth(&self, expires_ms: u64) -> Result<Value, ExchangeError> {
        let signature = hmac_sha256_hex(
            &self.credentials.secret_key,
            &format!("GET/realtime{}", expires_ms),
        )?;
        Ok(json!({
            "op": "auth",
            "args": [self.credentials.api_key, expires_ms, signature]
        }))
    }
}

impl Signer for BybitSigner {
    fn sign_request(
        &self,
        method: &str,
        _endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let payload = if method.eq_ignore_ascii_case("GET") {
            query_string
        } else {
            body_str(body)?
        };
        let prehash = format!(
            "{}{}{}{}",
            timestamp, self.credentials.api_key, RECV_WINDOW, payload
        );
        let signature = hmac_sha256_hex(&self.credentials.secret_key, &prehash)?;

        Ok(SignedRequest::new(query_string)
            .header("X-BAPI-API-KEY", self.credentials.api_key.clone())
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> BybitSigner {
        BybitSigner::new(Credentials {
            api_key: "XXXXXXXXXX".to_string(),
            secret_key: "YYYYYYYYYY".to_string(),
            passphrase: String::new(),
        })
    }

    #[test]
    fn test_get_signs_query() {
        let signed = signer()
            .sign_request("GET", "/v5/order/realtime", "category=linear&symbol=BTCUSDT", &[], 1_658_385_579_423)
            .unwrap();
        let expected = hmac_sha256_hex(
            "YYYYYYYYYY",
            "1658385579423XXXXXXXXXX5000category=linear&symbol=BTCUSDT",
        )
        .unwrap();
        assert_eq!(signed.headers["X-BAPI-SIGN"], expected);
        assert_eq!(expected.len(), 64);
        assert_eq!(signed.headers["X-BAPI-TIMESTAMP"], "1658385579423");
        assert_eq!(signed.query, "category=linear&symbol=BTCUSDT");
    }

    #[test]
    fn test_post_signs_body_deterministically() {
        let body = br#"{"category":"linear","symbol":"BTCUSDT"}"#;
        let a = signer().sign_request("POST", "/v5/order/create", "", body, 42).unwrap();
        let b = signer().sign_request("POST", "/v5/order/create", "", body, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.headers["X-BAPI-SIGN"],
            hmac_sha256_hex("YYYYYYYYYY", r#"42XXXXXXXXXX5000{"category":"linear","symbol":"BTCUSDT"}"#).unwrap()
        );
    }

    #[test]
    fn test_ws_auth_payload() {
        let auth = signer().ws_auth(1_662_350_400_000).unwrap();
        assert_eq!(auth["op"], "auth");
        assert_eq!(auth["args"][0], "XXXXXXXXXX");
        assert_eq!(auth["args"][1], 1_662_350_400_000_u64);
        assert_eq!(
            auth["args"][2],
            hmac_sha256_hex("YYYYYYYYYY", "GET/realtime1662350400000").unwrap()
        );
    }
}
