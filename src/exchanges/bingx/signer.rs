use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{append_param, hmac_sha256_hex, sorted_query};
use crate::core::kernel::{SignedRequest, Signer};
use std::collections::HashMap;

const API_KEY_HEADER: &str = "X-BX-APIKEY";

/// HMAC-SHA256 hex over the key-sorted query (including `timestamp`),
/// sent as the trailing `signature` parameter. Every parameter, writes
/// included, travels in the query string.
pub struct BingxSigner {
    credentials: Credentials,
}

impl BingxSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Signer for BingxSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        query_string: &str,
        _body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let query = sorted_query(&append_param(query_string, "timestamp", &timestamp.to_string()));
        let signature = hmac_sha256_hex(&self.credentials.secret_key, &query)?;

        Ok(SignedRequest::new(append_param(&query, "signature", &signature))
            .header(API_KEY_HEADER, self.credentials.api_key.clone()))
    }

    fn key_headers(&self) -> HashMap<String, String> {
        HashMap::from([(API_KEY_HEADER.to_string(), self.credentials.api_key.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> BingxSigner {
        BingxSigner::new(Credentials {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: String::new(),
        })
    }

    #[test]
    fn test_params_sorted_with_timestamp() {
        let signed = signer()
            .sign_request("POST", "/openApi/swap/v2/trade/order", "symbol=BTC-USDT&side=BUY", &[], 1_700_000_000_000)
            .unwrap();
        let sorted = "side=BUY&symbol=BTC-USDT&timestamp=1700000000000";
        let expected = hmac_sha256_hex("secret", sorted).unwrap();
        assert_eq!(signed.query, format!("{}&signature={}", sorted, expected));
        assert_eq!(signed.headers[API_KEY_HEADER], "key");
    }

    #[test]
    fn test_key_headers_carry_api_key() {
        assert_eq!(signer().key_headers()[API_KEY_HEADER], "key");
    }
}
