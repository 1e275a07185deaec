//! Client configuration.
//!
//! [`ClientConfig`] holds everything the verifier needs to locate the remote
//! authority and to decide how long its answers stay cached.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! server = "https://auth.example.com"
//! prefix = "/auth"
//! cache_duration = 3600000   # milliseconds, or a humantime string like "1h"
//! check_expired_list = true
//! request_timeout = "10s"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default path prefix for the authority endpoints.
pub const DEFAULT_PREFIX: &str = "/auth";

/// Default cache TTL (one hour).
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(60 * 60);

/// Default timeout for a single authority request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for talking to the key authority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the authority issuing keys and revocations (required).
    pub server: String,

    /// Path prefix for the `public-key` and `expired` endpoints.
    pub prefix: String,

    /// How long fetched keys and revocation lists stay cached.
    /// Accepts integer milliseconds or a humantime string.
    #[serde(alias = "cacheDuration", with = "millis_or_humantime")]
    pub cache_duration: Duration,

    /// Enables the remote revocation ("expired" list) check.
    #[serde(alias = "checkExpiredList")]
    pub check_expired_list: bool,

    /// Upper bound for every request made to the authority.
    #[serde(alias = "requestTimeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            cache_duration: DEFAULT_CACHE_DURATION,
            check_expired_list: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The HTTP client for the authority could not be built.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

impl ClientConfig {
    /// Creates a configuration for the given authority with default options.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Sets the endpoint path prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the cache TTL.
    #[must_use]
    pub fn with_cache_duration(mut self, ttl: Duration) -> Self {
        self.cache_duration = ttl;
        self
    }

    /// Enables or disables the revocation check.
    #[must_use]
    pub fn with_check_expired_list(mut self, enabled: bool) -> Self {
        self.check_expired_list = enabled;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `server` is empty, and
    /// `ConfigError::InvalidValue` if the endpoint URLs cannot be built or a
    /// duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Missing("server".to_string()));
        }

        self.public_key_url()?;

        if self.cache_duration.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cache_duration must be > 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// URL of the public key endpoint: `{server}{prefix}/public-key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the result is not a valid URL.
    pub fn public_key_url(&self) -> Result<Url, ConfigError> {
        self.endpoint("public-key")
    }

    /// URL of the revocation endpoint: `{server}{prefix}/expired`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the result is not a valid URL.
    pub fn expired_url(&self) -> Result<Url, ConfigError> {
        self.endpoint("expired")
    }

    fn endpoint(&self, name: &str) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}{}/{}",
            self.server.trim_end_matches('/'),
            self.prefix,
            name
        );
        let url = Url::parse(&raw).map_err(|e| {
            ConfigError::InvalidValue(format!("Invalid authority URL '{}': {}", raw, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidValue(format!(
                "Unsupported authority URL scheme: '{}'",
                other
            ))),
        }
    }
}

/// Serde adapter for durations written either as integer milliseconds or as
/// a humantime string ("90s", "1h").
mod millis_or_humantime {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(text) => match text.trim().parse::<u64>() {
                Ok(ms) => Ok(Duration::from_millis(ms)),
                Err(_) => humantime_serde::re::humantime::parse_duration(&text)
                    .map_err(serde::de::Error::custom),
            },
        }
    }
}
