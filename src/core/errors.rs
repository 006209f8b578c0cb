use thiserror::Error;

/// Coarse classification of an exchange application error.
///
/// The exchange's own code and message are always kept verbatim next to the
/// kind; the kind only exists so shared helpers (batch cancel, batch place)
/// can react to well-known conditions without knowing every exchange's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The order does not exist, or is already canceled/filled.
    OrderNotFound,
    /// Not enough margin or balance to place the order.
    InsufficientMargin,
    RateLimited,
    Auth,
    Other,
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
        kind: ApiErrorKind,
    },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Stream already running: {0}")]
    StreamAlreadyRunning(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ExchangeError {
    /// Build an application error, keeping the exchange's code and message as-is.
    pub fn api(code: impl Into<String>, message: impl Into<String>, kind: ApiErrorKind) -> Self {
        Self::ApiError {
            code: code.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::ApiError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// "Order does not exist / already canceled": callers treat it as resolved.
    pub fn is_order_not_found(&self) -> bool {
        self.api_kind() == Some(ApiErrorKind::OrderNotFound)
    }

    pub fn is_insufficient_margin(&self) -> bool {
        self.api_kind() == Some(ApiErrorKind::InsufficientMargin)
    }

    /// Transport-level failure: the request may never have reached the exchange.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::NetworkError(_) | Self::ConnectionTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_code_and_message() {
        let err = ExchangeError::api("51400", "Order does not exist", ApiErrorKind::OrderNotFound);
        assert_eq!(err.to_string(), "API error: 51400 - Order does not exist");
        assert!(err.is_order_not_found());
        assert!(!err.is_insufficient_margin());
    }

    #[test]
    fn test_non_api_errors_have_no_kind() {
        let err = ExchangeError::NetworkError("connection refused".to_string());
        assert!(err.api_kind().is_none());
        assert!(err.is_transport());
        assert!(!err.is_order_not_found());
    }
}
