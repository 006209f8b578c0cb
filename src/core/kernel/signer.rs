use crate::core::errors::ExchangeError;
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Headers and final (already URL-encoded) query string of a signed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedRequest {
    pub headers: HashMap<String, String>,
    /// Query string to send, without the leading '?'. Signers that add
    /// `timestamp`/`signature` parameters return the extended string here.
    pub query: String,
}

impl SignedRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            headers: HashMap::new(),
            query: query.into(),
        }
    }

    #[must_use]
    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_string(), value.into());
        self
    }
}

pub type SignatureResult = Result<SignedRequest, ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations are pure: the same inputs (including `timestamp`) always
/// produce the same headers and query.
pub trait Signer: Send + Sync {
    /// Sign a request
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `endpoint` - API endpoint path
    /// * `query_string` - URL-encoded query string (without leading '?')
    /// * `body` - Raw request body bytes
    /// * `timestamp` - Request timestamp in milliseconds
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> SignatureResult;

    /// Headers for endpoints that only need the API key (listen keys).
    fn key_headers(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

pub fn hmac_sha256(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    hmac_sha256(secret.as_bytes(), payload.as_bytes()).map(hex::encode)
}

pub fn hmac_sha256_base64(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    hmac_sha256(secret.as_bytes(), payload.as_bytes())
        .map(|bytes| general_purpose::STANDARD.encode(bytes))
}

pub fn hmac_sha512_hex(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn sha512_hex(payload: &[u8]) -> String {
    hex::encode(Sha512::digest(payload))
}

/// Sort `k=v` pairs of a query string by key (stable for equal keys).
pub fn sorted_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_by(|a, b| {
        let key_a = a.split_once('=').map_or(*a, |(k, _)| k);
        let key_b = b.split_once('=').map_or(*b, |(k, _)| k);
        key_a.cmp(key_b)
    });
    pairs.join("&")
}

/// Append `key=value` to a query string.
pub fn append_param(query: &str, key: &str, value: &str) -> String {
    if query.is_empty() {
        format!("{}={}", key, value)
    } else {
        format!("{}&{}={}", query, key, value)
    }
}

pub fn body_str(body: &[u8]) -> Result<&str, ExchangeError> {
    std::str::from_utf8(body)
        .map_err(|e| ExchangeError::AuthError(format!("Invalid body encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_hex_known_vector() {
        // Published HMAC-SHA256 example
        let sig = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_hmac_lengths() {
        assert_eq!(hmac_sha256_hex("s", "p").unwrap().len(), 64);
        assert_eq!(hmac_sha512_hex("s", "p").unwrap().len(), 128);
        assert_eq!(hmac_sha256_base64("s", "p").unwrap().len(), 44);
        assert_eq!(sha512_hex(b"").len(), 128);
    }

    #[test]
    fn test_sorted_query() {
        assert_eq!(sorted_query("symbol=BTC&side=BUY&amount=1"), "amount=1&side=BUY&symbol=BTC");
        assert_eq!(sorted_query(""), "");
    }

    #[test]
    fn test_append_param() {
        assert_eq!(append_param("", "a", "1"), "a=1");
        assert_eq!(append_param("a=1", "b", "2"), "a=1&b=2");
    }
}
