use secrecy::{ExposeSecret, Secret};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::env;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Recognized keys of the adapter config map.
pub mod keys {
    pub const API_KEY: &str = "api_key";
    pub const SECRET_KEY: &str = "secret_key";
    pub const PASSPHRASE: &str = "passphrase";
    pub const TESTNET: &str = "testnet";
    pub const BASE_URL: &str = "base_url";
    pub const WS_URL: &str = "ws_url";
    pub const PUBLIC_WS_URL: &str = "public_ws_url";
    pub const BROKER_PREFIX: &str = "broker_prefix";
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub passphrase: Option<Secret<String>>,
    pub testnet: bool,
    /// Overrides the REST base URL (mainnet/testnet selection is skipped).
    pub base_url: Option<String>,
    /// Overrides the private WebSocket endpoint.
    pub ws_url: Option<String>,
    /// Overrides the public (candle) WebSocket endpoint.
    pub public_ws_url: Option<String>,
    pub broker_prefix: Option<String>,
}

// Never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 6)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field(
            "passphrase",
            &self.passphrase.as_ref().map(|_| "[REDACTED]"),
        )?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("broker_prefix", &self.broker_prefix)?;
        state.end()
    }
}

impl ExchangeConfig {
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            passphrase: None,
            testnet: false,
            base_url: None,
            ws_url: None,
            public_ws_url: None,
            broker_prefix: None,
        }
    }

    /// Build a configuration from the adapter config map.
    ///
    /// Missing keys become empty credentials; whether that is acceptable is
    /// decided by each exchange builder. `testnet` accepts `"true"`/`"1"`.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let testnet = get(keys::TESTNET)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Self {
            api_key: Secret::new(get(keys::API_KEY).unwrap_or_default()),
            secret_key: Secret::new(get(keys::SECRET_KEY).unwrap_or_default()),
            passphrase: get(keys::PASSPHRASE).map(Secret::new),
            testnet,
            base_url: get(keys::BASE_URL),
            ws_url: get(keys::WS_URL),
            public_ws_url: get(keys::PUBLIC_WS_URL),
            broker_prefix: get(keys::BROKER_PREFIX),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{EXCHANGE}_API_KEY` (e.g., `OKX_API_KEY`)
    /// - `{EXCHANGE}_SECRET_KEY`
    /// - `{EXCHANGE}_PASSPHRASE` (optional)
    /// - `{EXCHANGE}_TESTNET` (optional, defaults to false)
    /// - `{EXCHANGE}_BASE_URL` (optional)
    pub fn from_env(exchange_prefix: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_map(&Self::map_from_env(exchange_prefix)?))
    }

    /// The raw config map `from_env` reads, as accepted by `build_adapter`.
    pub fn map_from_env(exchange_prefix: &str) -> Result<HashMap<String, String>, ConfigError> {
        let prefix = exchange_prefix.to_uppercase();
        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix)).ok();

        let api_key = var("API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable(format!("{}_API_KEY", prefix)))?;
        let secret_key = var("SECRET_KEY").ok_or_else(|| {
            ConfigError::MissingEnvironmentVariable(format!("{}_SECRET_KEY", prefix))
        })?;

        let mut map = HashMap::from([
            (keys::API_KEY.to_string(), api_key),
            (keys::SECRET_KEY.to_string(), secret_key),
        ]);
        for (suffix, key) in [
            ("PASSPHRASE", keys::PASSPHRASE),
            ("TESTNET", keys::TESTNET),
            ("BASE_URL", keys::BASE_URL),
            ("WS_URL", keys::WS_URL),
            ("PUBLIC_WS_URL", keys::PUBLIC_WS_URL),
            ("BROKER_PREFIX", keys::BROKER_PREFIX),
        ] {
            if let Some(value) = var(suffix) {
                map.insert(key.to_string(), value);
            }
        }

        Ok(map)
    }

    /// Load a `.env` file (if present) and then read the environment.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(exchange_prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(exchange_prefix, ".env")
    }

    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(
        exchange_prefix: &str,
        env_file_path: &str,
    ) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            // No file is fine, fall through to the process environment
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(exchange_prefix)
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.secret_key.expose_secret().is_empty()
    }

    /// Credentials for a signer, failing fast when any required part is missing.
    pub fn credentials(
        &self,
        exchange: &str,
        require_passphrase: bool,
    ) -> Result<Credentials, ConfigError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingCredential {
                exchange: exchange.to_string(),
                key: keys::API_KEY,
            });
        }
        if self.secret_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingCredential {
                exchange: exchange.to_string(),
                key: keys::SECRET_KEY,
            });
        }

        let passphrase = self
            .passphrase
            .as_ref()
            .map(|p| p.expose_secret().clone())
            .unwrap_or_default();
        if require_passphrase && passphrase.is_empty() {
            return Err(ConfigError::MissingCredential {
                exchange: exchange.to_string(),
                key: keys::PASSPHRASE,
            });
        }

        Ok(Credentials {
            api_key: self.api_key.expose_secret().clone(),
            secret_key: self.secret_key.expose_secret().clone(),
            passphrase,
        })
    }

    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    #[must_use]
    pub fn passphrase(mut self, passphrase: String) -> Self {
        self.passphrase = Some(Secret::new(passphrase));
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    /// REST base URL: explicit override first, then testnet/mainnet.
    pub fn resolve_base_url(&self, mainnet: &str, testnet: &str) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            if self.testnet {
                testnet.to_string()
            } else {
                mainnet.to_string()
            }
        })
    }

    pub fn resolve_ws_url(&self, mainnet: &str, testnet: &str) -> String {
        self.ws_url.clone().unwrap_or_else(|| {
            if self.testnet {
                testnet.to_string()
            } else {
                mainnet.to_string()
            }
        })
    }

    pub fn resolve_public_ws_url(&self, mainnet: &str, testnet: &str) -> String {
        self.public_ws_url.clone().unwrap_or_else(|| {
            if self.testnet {
                testnet.to_string()
            } else {
                mainnet.to_string()
            }
        })
    }
}

/// API credentials handed to a signer. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("{exchange} requires a non-empty `{key}`")]
    MissingCredential { exchange: String, key: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
