use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{append_param, body_str, hmac_sha256_hex};
use crate::core::kernel::{SignedRequest, Signer};
use std::collections::HashMap;

const RECV_WINDOW: &str = "5000";

/// HMAC-SHA256 over the full query string, sent as the `signature` parameter.
pub struct BinanceSigner {
    credentials: Credentials,
}

impl BinanceSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Signer for BinanceSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let query = append_param(query_string, "recvWindow", RECV_WINDOW);
        let query = append_param(&query, "timestamp", &timestamp.to_string());

        // Binance hashes the query followed directly by any form body
        let payload = format!("{}{}", query, body_str(body)?);
        let signature = hmac_sha256_hex(&self.credentials.secret_key, &payload)?;

        Ok(
            SignedRequest::new(append_param(&query, "signature", &signature))
                .header("X-MBX-APIKEY", self.credentials.api_key.clone()),
        )
    }

    fn key_headers(&self) -> HashMap<String, String> {
        HashMap::from([("X-MBX-APIKEY".to_string(), self.credentials.api_key.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> BinanceSigner {
        BinanceSigner::new(Credentials {
            api_key: "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A".to_string(),
            secret_key: "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j"
                .to_string(),
            passphrase: String::new(),
        })
    }

    #[test]
    fn test_signature_is_deterministic_hex() {
        let query = "symbol=BTCUSDT&side=BUY&type=LIMIT&quantity=1&price=9000";
        let a = signer().sign_request("POST", "/fapi/v1/order", query, &[], 1_591_702_613_943).unwrap();
        let b = signer().sign_request("POST", "/fapi/v1/order", query, &[], 1_591_702_613_943).unwrap();
        assert_eq!(a, b);

        let (signed_part, signature) = a.query.rsplit_once("&signature=").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(signed_part.ends_with("recvWindow=5000&timestamp=1591702613943"));
        assert_eq!(
            signature,
            hmac_sha256_hex(&signer().credentials.secret_key, signed_part).unwrap()
        );
        assert_eq!(
            a.headers.get("X-MBX-APIKEY").map(String::as_str),
            Some(signer().credentials.api_key.as_str())
        );
    }

    #[test]
    fn test_timestamp_changes_signature() {
        let a = signer().sign_request("GET", "/fapi/v2/account", "", &[], 1).unwrap();
        let b = signer().sign_request("GET", "/fapi/v2/account", "", &[], 2).unwrap();
        assert_ne!(a.query, b.query);
        assert!(a.query.starts_with("recvWindow=5000&timestamp=1&signature="));
    }
}
