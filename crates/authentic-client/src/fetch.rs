//! Remote authority fetchers.
//!
//! The authority exposes two JSON endpoints:
//!
//! - `GET {server}{prefix}/public-key` answering `{"data": {"publicKey": "<PEM>"}}`
//! - `GET {server}{prefix}/expired` answering `{"<subject hash>": <seconds>, ...}`
//!
//! [`PublicKeyFetcher`] and [`RevocationFetcher`] extract the relevant part of
//! each response. Both implement [`Loader`] and are only ever driven through a
//! [`TtlCache`](crate::cache::TtlCache).
//!
//! Transport is abstracted behind [`JsonFetcher`]; [`HttpJsonFetcher`] is the
//! reqwest-backed implementation used in production.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde_json::Value;
use url::Url;

use crate::AuthResult;
use crate::cache::Loader;
use crate::error::AuthError;

/// Maximum accepted response size in bytes (1 MB).
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

// =============================================================================
// Transport
// =============================================================================

/// Performs a GET request and returns the parsed JSON body.
#[async_trait]
pub trait JsonFetcher: Send + Sync + 'static {
    /// Fetches `url`. An empty body yields `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteFetchFailure` error on transport failure, non-success
    /// status or an unparseable body.
    async fn fetch_json(&self, url: &Url) -> AuthResult<Value>;
}

/// [`JsonFetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpJsonFetcher {
    http_client: reqwest::Client,
}

impl HttpJsonFetcher {
    /// Creates a fetcher whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl JsonFetcher for HttpJsonFetcher {
    async fn fetch_json(&self, url: &Url) -> AuthResult<Value> {
        tracing::debug!(%url, "Fetching from authority");

        let response = self
            .http_client
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%url, error = %e, "Authority request failed");
                AuthError::from(e)
            })?;

        if !response.status().is_success() {
            return Err(AuthError::remote_fetch(format!(
                "Authority request to {} failed with status {}",
                url,
                response.status().as_u16()
            )));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_SIZE
        {
            return Err(AuthError::remote_fetch(format!(
                "Authority response exceeds maximum size of {} bytes",
                MAX_RESPONSE_SIZE
            )));
        }

        let body = response.bytes().await?;
        if body.len() > MAX_RESPONSE_SIZE {
            return Err(AuthError::remote_fetch(format!(
                "Authority response exceeds maximum size of {} bytes",
                MAX_RESPONSE_SIZE
            )));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(%url, error = %e, "Failed to parse authority response");
            AuthError::remote_fetch(format!("Invalid JSON from {}: {}", url, e))
        })
    }
}

// =============================================================================
// Public key
// =============================================================================

/// An RSA public key published by the authority.
#[derive(Clone)]
pub struct PublicKey {
    pem: String,
    decoding_key: DecodingKey,
}

impl PublicKey {
    /// Parses a PEM-encoded RSA public key.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteFetchFailure` error if the PEM cannot be parsed.
    pub fn from_pem(pem: impl Into<String>) -> AuthResult<Self> {
        let pem = pem.into();
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::remote_fetch(format!("Invalid public key: {}", e)))?;
        Ok(Self { pem, decoding_key })
    }

    /// The key as published.
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// The key prepared for signature verification.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("pem_len", &self.pem.len())
            .finish_non_exhaustive()
    }
}

/// Loads the authority's public key from `{server}{prefix}/public-key`.
pub struct PublicKeyFetcher {
    fetcher: Arc<dyn JsonFetcher>,
    url: Url,
}

impl PublicKeyFetcher {
    /// Creates a fetcher for the given endpoint.
    #[must_use]
    pub fn new(fetcher: Arc<dyn JsonFetcher>, url: Url) -> Self {
        Self { fetcher, url }
    }
}

#[async_trait]
impl Loader for PublicKeyFetcher {
    type Value = PublicKey;

    async fn load(&self, _key: &str) -> AuthResult<PublicKey> {
        let body = self.fetcher.fetch_json(&self.url).await?;

        let pem = body
            .pointer("/data/publicKey")
            .and_then(Value::as_str)
            .filter(|pem| !pem.is_empty())
            .ok_or_else(|| AuthError::remote_fetch("Could not retrieve public key"))?;

        let key = PublicKey::from_pem(pem)?;
        tracing::debug!(url = %self.url, "Retrieved public key");
        Ok(key)
    }
}

// =============================================================================
// Revocation list
// =============================================================================

/// Snapshot of the authority's revocation list.
///
/// Maps a subject hash to the revocation time in seconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationMap {
    entries: HashMap<String, i64>,
}

impl RevocationMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the revocation time for `subject_hash`, if any.
    #[must_use]
    pub fn revoked_at(&self, subject_hash: &str) -> Option<i64> {
        self.entries.get(subject_hash).copied()
    }

    /// Number of revoked subjects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a map from a response body.
    ///
    /// Entries whose value is not a number are skipped.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteFetchFailure` error if the body is not an object.
    pub fn from_json(body: &Value) -> AuthResult<Self> {
        let object = match body {
            Value::Object(object) => object,
            other => {
                return Err(AuthError::remote_fetch(format!(
                    "Unexpected expired list format: {}",
                    json_type(other)
                )));
            }
        };

        let entries = object
            .iter()
            .filter_map(|(hash, value)| {
                let revoked_at = value
                    .as_i64()
                    .or_else(|| value.as_f64().map(|secs| secs as i64));
                if revoked_at.is_none() {
                    tracing::warn!(subject_hash = %hash, "Ignoring non-numeric expired list entry");
                }
                revoked_at.map(|at| (hash.clone(), at))
            })
            .collect();

        Ok(Self { entries })
    }
}

impl FromIterator<(String, i64)> for RevocationMap {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Loads the revocation list from `{server}{prefix}/expired`.
pub struct RevocationFetcher {
    fetcher: Arc<dyn JsonFetcher>,
    url: Url,
}

impl RevocationFetcher {
    /// Creates a fetcher for the given endpoint.
    #[must_use]
    pub fn new(fetcher: Arc<dyn JsonFetcher>, url: Url) -> Self {
        Self { fetcher, url }
    }
}

#[async_trait]
impl Loader for RevocationFetcher {
    /// `None` when the authority answered with an empty or `null` body.
    type Value = Option<RevocationMap>;

    async fn load(&self, _key: &str) -> AuthResult<Option<RevocationMap>> {
        let body = self.fetcher.fetch_json(&self.url).await?;
        if body.is_null() {
            tracing::debug!(url = %self.url, "Authority returned no expired list");
            return Ok(None);
        }

        let map = RevocationMap::from_json(&body)?;
        tracing::debug!(url = %self.url, entries = map.len(), "Retrieved expired list");
        Ok(Some(map))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
