use crate::core::errors::{ApiErrorKind, ExchangeError};
use crate::core::kernel::signer::Signer;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{instrument, trace};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// How a request is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Public,
    /// Only the API key header, no signature (listen-key endpoints).
    KeyOnly,
    Signed,
}

impl From<bool> for Auth {
    fn from(authenticated: bool) -> Self {
        if authenticated {
            Self::Signed
        } else {
            Self::Public
        }
    }
}

/// REST client trait for making HTTP requests
///
/// Implementations only provide [`RestClient::request`]; the verb helpers are
/// built on top of it, which keeps test doubles to a single method.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Send one request and return the decoded JSON body.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - The API endpoint path
    /// * `query_params` - Query parameters as key-value pairs (not yet encoded)
    /// * `body` - Request body as raw bytes, sent as JSON when non-empty
    /// * `auth` - Authentication mode
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &[u8],
        auth: Auth,
    ) -> Result<Value, ExchangeError>;

    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        self.request(Method::GET, endpoint, query_params, &[], authenticated.into())
            .await
    }

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.get(endpoint, query_params, authenticated).await?;
        from_value(value)
    }

    async fn post(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        let body_bytes = to_body(body)?;
        self.request(Method::POST, endpoint, &[], &body_bytes, authenticated.into())
            .await
    }

    async fn post_json<T: DeserializeOwned + Send>(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.post(endpoint, body, authenticated).await?;
        from_value(value)
    }

    async fn put(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        let body_bytes = to_body(body)?;
        self.request(Method::PUT, endpoint, &[], &body_bytes, authenticated.into())
            .await
    }

    async fn delete(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        self.request(Method::DELETE, endpoint, query_params, &[], authenticated.into())
            .await
    }

    async fn delete_json<T: DeserializeOwned + Send>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.delete(endpoint, query_params, authenticated).await?;
        from_value(value)
    }

    /// Signed request with an arbitrary method, query and body.
    async fn signed_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Value, ExchangeError> {
        self.request(method, endpoint, query_params, body, Auth::Signed)
            .await
    }

    async fn signed_request_json<T: DeserializeOwned + Send>(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &[u8],
    ) -> Result<T, ExchangeError> {
        let value = self
            .signed_request(method, endpoint, query_params, body)
            .await?;
        from_value(value)
    }
}

fn to_body(body: &Value) -> Result<Vec<u8>, ExchangeError> {
    serde_json::to_vec(body).map_err(|e| {
        ExchangeError::SerializationError(format!("Failed to serialize request body: {}", e))
    })
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value)
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to deserialize JSON: {}", e)))
}

/// Re-read the body of a non-2xx response as the exchange's error payload.
///
/// Several exchanges answer business errors with HTTP 4xx and a JSON body
/// carrying their own code; the transport only sees the status.
pub fn remap_http_error<E, F>(error: ExchangeError, map: F) -> ExchangeError
where
    E: DeserializeOwned,
    F: FnOnce(E) -> ExchangeError,
{
    let parsed = match &error {
        ExchangeError::ApiError { message, .. } => serde_json::from_str::<E>(message).ok(),
        _ => None,
    };
    parsed.map_or(error, map)
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Client-side request budget per second
    pub requests_per_second: NonZeroU32,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            exchange_name,
            timeout_seconds: 10,
            requests_per_second: nonzero!(10u32),
            user_agent: "omnigate/0.1".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::ConfigError(crate::core::config::ConfigError::InvalidConfiguration(
                    format!("Failed to build HTTP client: {}", e),
                ))
            })?;

        let limiter = RateLimiter::direct(Quota::per_second(self.config.requests_per_second));

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
            limiter: Arc::new(limiter),
        })
    }
}

/// Implementation of `RestClient` using reqwest
///
/// Each instance owns its HTTP client and rate limiter; two adapters never
/// share either.
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn exchange_name(&self) -> &str {
        &self.config.exchange_name
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn timestamp_ms() -> Result<u64, ExchangeError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .map_err(|e| ExchangeError::Other(format!("Failed to get timestamp: {}", e)))
    }

    fn build_url(&self, endpoint: &str, query_params: &[(&str, &str)]) -> Result<Url, ExchangeError> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, endpoint)).map_err(|e| {
            ExchangeError::InvalidParameters(format!("Invalid URL for {}: {}", endpoint, e))
        })?;
        if !query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(query_params.iter());
        }
        Ok(url)
    }

    fn status_kind(status: StatusCode) -> ApiErrorKind {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ApiErrorKind::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiErrorKind::Auth,
            _ => ApiErrorKind::Other,
        }
    }

    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        if status.is_success() {
            if response_text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&response_text).map_err(|e| {
                ExchangeError::DeserializationError(format!("Failed to parse JSON response: {}", e))
            })
        } else if serde_json::from_str::<Value>(&response_text).is_ok() {
            // Exchange error envelopes are remapped by the per-exchange layer
            Err(ExchangeError::api(
                status.as_u16().to_string(),
                response_text,
                Self::status_kind(status),
            ))
        } else {
            Err(ExchangeError::NetworkError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                response_text
            )))
        }
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, query_params, body), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint))]
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &[u8],
        auth: Auth,
    ) -> Result<Value, ExchangeError> {
        let mut url = self.build_url(endpoint, query_params)?;
        let mut headers = Vec::new();

        match auth {
            Auth::Public => {}
            Auth::KeyOnly | Auth::Signed => {
                let signer = self
                    .signer
                    .as_ref()
                    .ok_or(ExchangeError::AuthenticationRequired)?;

                if auth == Auth::KeyOnly {
                    headers.extend(signer.key_headers());
                } else {
                    let query_string = url.query().unwrap_or_default().to_string();
                    let signed = signer.sign_request(
                        method.as_str(),
                        endpoint,
                        &query_string,
                        body,
                        Self::timestamp_ms()?,
                    )?;
                    url.set_query((!signed.query.is_empty()).then_some(signed.query.as_str()));
                    headers.extend(signed.headers);
                }
            }
        }

        self.limiter.until_ready().await;

        let mut request = self.client.request(method, url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body.to_vec());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExchangeError::ConnectionTimeout(format!("Request timed out: {}", e))
            } else {
                ExchangeError::NetworkError(format!("Request failed: {}", e))
            }
        })?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::signer::SignedRequest;

    struct QuerySigner;

    impl Signer for QuerySigner {
        fn sign_request(
            &self,
            _method: &str,
            _endpoint: &str,
            query_string: &str,
            _body: &[u8],
            _timestamp: u64,
        ) -> Result<SignedRequest, ExchangeError> {
            Ok(SignedRequest::new(format!("{}&signature=abc", query_string)).header("X-KEY", "k"))
        }
    }

    fn client(base: &str) -> ReqwestRest {
        RestClientBuilder::new(RestClientConfig::new(base.to_string(), "test".to_string()))
            .with_signer(Arc::new(QuerySigner))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_url_encodes_query() {
        let rest = client("https://example.com/");
        let url = rest
            .build_url("/api/v1/batch", &[("ids", "[1,2]"), ("symbol", "BTC-USDT")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/api/v1/batch?ids=%5B1%2C2%5D&symbol=BTC-USDT"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = RestClientConfig::new("https://x".to_string(), "x".to_string());
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.requests_per_second.get(), 10);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let rest = client("http://127.0.0.1:1");
        let err = rest.get("/ping", &[], false).await.unwrap_err();
        assert!(err.is_transport(), "{:?}", err);
    }

    /// One-shot HTTP server answering every request with `status` and `body`.
    async fn serve_once(status: &'static str, content_type: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 2048];
            let _ = socket.read(&mut buf).await;
            let reply = format!(
                "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_html_gateway_error_is_transport_error() {
        let base = serve_once(
            "502 Bad Gateway",
            "text/html",
            "<html><body>502 Bad Gateway</body></html>",
        )
        .await;
        let err = client(&base).get("/x", &[], false).await.unwrap_err();
        assert!(err.is_transport(), "{:?}", err);
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_json_error_body_stays_api_error() {
        let base = serve_once(
            "400 Bad Request",
            "application/json",
            r#"{"code":-2011,"msg":"Unknown order sent."}"#,
        )
        .await;
        let err = client(&base).get("/x", &[], false).await.unwrap_err();
        match err {
            ExchangeError::ApiError { code, message, .. } => {
                assert_eq!(code, "400");
                assert!(message.contains("-2011"));
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signed_request_without_signer_fails() {
        let rest = RestClientBuilder::new(RestClientConfig::new(
            "http://127.0.0.1:1".to_string(),
            "test".to_string(),
        ))
        .build()
        .unwrap();
        let err = rest.get("/private", &[], true).await.unwrap_err();
        assert!(matches!(err, ExchangeError::AuthenticationRequired));
    }

    #[test]
    fn test_remap_http_error() {
        #[derive(serde::Deserialize)]
        struct Body {
            code: i64,
            msg: String,
        }
        let err = ExchangeError::api("400", r#"{"code":-2011,"msg":"Unknown order sent."}"#, ApiErrorKind::Other);
        let mapped = remap_http_error(err, |b: Body| {
            ExchangeError::api(b.code.to_string(), b.msg, ApiErrorKind::OrderNotFound)
        });
        assert!(mapped.is_order_not_found());

        let plain = ExchangeError::api("502", "Bad Gateway", ApiErrorKind::Other);
        let untouched = remap_http_error(plain, |b: Body| ExchangeError::Other(b.msg));
        assert!(matches!(untouched, ExchangeError::ApiError { .. }));
    }
}
