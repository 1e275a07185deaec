//! Shared helpers for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;
use crate::fetch::JsonFetcher;

pub const PUBLIC_KEY_PEM: &str = include_str!("../tests/fixtures/rsa-public.pem");
const PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/rsa-private.pem");
const OTHER_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/other-private.pem");

/// Answers from a fixed URL -> body table. Unknown URLs fail like a
/// connection error would. Per-URL delays use tokio time, so paused-time
/// tests can measure them.
#[derive(Default)]
pub struct StaticJsonFetcher {
    responses: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticJsonFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, body: Value) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Handle for observing how many fetches were made.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl JsonFetcher for StaticJsonFetcher {
    async fn fetch_json(&self, url: &Url) -> AuthResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        self.responses
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| AuthError::remote_fetch(format!("connection refused: {url}")))
    }
}

/// Signs `claims` with the fixture key matching [`PUBLIC_KEY_PEM`].
pub fn sign<T: Serialize>(claims: &T) -> String {
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

/// Signs `claims` with an unrelated RSA key.
pub fn sign_with_other_key<T: Serialize>(claims: &T) -> String {
    let key = EncodingKey::from_rsa_pem(OTHER_PRIVATE_KEY_PEM.as_bytes()).unwrap();
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
