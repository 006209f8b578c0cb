use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{body_str, hmac_sha256_base64};
use crate::core::kernel::{SignedRequest, Signer};

/// KuCoin key version 2: the passphrase itself is HMAC-signed with the secret.
pub struct KucoinSigner {
    credentials: Credentials,
    signed_passphrase: String,
}

impl KucoinSigner {
    pub fn new(credentials: Credentials) -> Result<Self, ExchangeError> {
        let signed_passphrase =
            hmac_sha256_base64(&credentials.secret_key, &credentials.passphrase)?;
        Ok(Self {
            credentials,
            signed_passphrase,
        })
    }
}

impl Signer for KucoinSigner {
    /// base64(HMAC-SHA256(secret, `ts + METHOD + path[?query] + body`)).
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let path = if query_string.is_empty() {
            endpoint.to_string()
        } else {
            format!("{}?{}", endpoint, query_string)
        };
        let prehash = format!(
            "{}{}{}{}",
            timestamp,
            method.to_uppercase(),
            path,
            body_str(body)?
        );
        let signature = hmac_sha256_base64(&self.credentials.secret_key, &prehash)?;

        Ok(SignedRequest::new(query_string)
            .header("KC-API-KEY", self.credentials.api_key.clone())
            .header("KC-API-SIGN", signature)
            .header("KC-API-TIMESTAMP", timestamp.to_string())
            .header("KC-API-PASSPHRASE", self.signed_passphrase.clone())
            .header("KC-API-KEY-VERSION", "2"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> KucoinSigner {
        KucoinSigner::new(Credentials {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: "phrase".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_passphrase_is_signed() {
        let signed = signer().sign_request("GET", "/api/v1/position", "symbol=XBTUSDTM", &[], 1_700_000_000_000).unwrap();
        assert_eq!(
            signed.headers["KC-API-PASSPHRASE"],
            hmac_sha256_base64("secret", "phrase").unwrap()
        );
        assert_eq!(signed.headers["KC-API-KEY-VERSION"], "2");
    }

    #[test]
    fn test_query_is_part_of_the_path() {
        let signed = signer().sign_request("GET", "/api/v1/position", "symbol=XBTUSDTM", &[], 1_700_000_000_000).unwrap();
        let expected = hmac_sha256_base64("secret", "1700000000000GET/api/v1/position?symbol=XBTUSDTM").unwrap();
        assert_eq!(signed.headers["KC-API-SIGN"], expected);
    }

    #[test]
    fn test_post_signs_body() {
        let body = br#"{"symbol":"XBTUSDTM"}"#;
        let signed = signer().sign_request("post", "/api/v1/orders", "", body, 1).unwrap();
        let expected = hmac_sha256_base64("secret", r#"1POST/api/v1/orders{"symbol":"XBTUSDTM"}"#).unwrap();
        assert_eq!(signed.headers["KC-API-SIGN"], expected);
    }
}
