//! Bearer token verification against the remote authority.
//!
//! # Example
//!
//! ```ignore
//! use authentic_client::{ClientConfig, TokenVerifier};
//!
//! let verifier = TokenVerifier::new(
//!     ClientConfig::new("https://auth.example.com").with_check_expired_list(true),
//! )?;
//! let claims = verifier.verify(&token).await?;
//! println!("authenticated {:?}", claims.email());
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation};

use crate::AuthResult;
use crate::cache::TtlCache;
use crate::config::{ClientConfig, ConfigError};
use crate::error::AuthError;
use crate::fetch::{
    HttpJsonFetcher, JsonFetcher, PublicKey, PublicKeyFetcher, RevocationFetcher, RevocationMap,
};
use crate::token::claims::Claims;

/// Cache key under which the public key is stored.
pub const PUBLIC_KEY_CACHE_KEY: &str = "pubKey";

/// Cache key under which the revocation list is stored.
pub const EXPIRED_LIST_CACHE_KEY: &str = "expired";

/// Verifies RS256 bearer tokens issued by the authority.
///
/// Owns the caches for the public key and, when revocation checking is
/// enabled, the revocation list. Cloning is not supported; share it behind an
/// `Arc`.
pub struct TokenVerifier {
    keys: TtlCache<PublicKeyFetcher>,
    revocations: Option<TtlCache<RevocationFetcher>>,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier that reaches the authority over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fetcher = HttpJsonFetcher::new(config.request_timeout)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Creates a verifier using the given transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URLs cannot be built.
    pub fn with_fetcher(
        config: &ClientConfig,
        fetcher: Arc<dyn JsonFetcher>,
    ) -> Result<Self, ConfigError> {
        let keys = TtlCache::new(
            PublicKeyFetcher::new(Arc::clone(&fetcher), config.public_key_url()?),
            config.cache_duration,
        );

        let revocations = if config.check_expired_list {
            Some(TtlCache::new(
                RevocationFetcher::new(fetcher, config.expired_url()?),
                config.cache_duration,
            ))
        } else {
            None
        };

        // Signature and algorithm only; the time window is checked on the
        // decoded claims so non-integer `exp`/`nbf` values are honoured.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        tracing::debug!(
            server = %config.server,
            check_expired_list = config.check_expired_list,
            cache_duration = ?config.cache_duration,
            "Created token verifier"
        );

        Ok(Self {
            keys,
            revocations,
            validation,
        })
    }

    /// Returns `true` if tokens are checked against the revocation list.
    #[must_use]
    pub fn checks_expired_list(&self) -> bool {
        self.revocations.is_some()
    }

    /// Verifies `token` and returns its claims.
    ///
    /// The public key and, if enabled, the revocation list are resolved
    /// concurrently through their caches before the signature is checked.
    ///
    /// # Errors
    ///
    /// - `RemoteFetchFailure` if the key or revocation list is unavailable
    /// - `MalformedToken` for an empty token, bad structure, bad signature or
    ///   wrong algorithm
    /// - `Expired` once `now >= exp`, `NotYetValid` while `nbf > now`
    /// - `RemoteRevoked` if the subject's email was revoked at or after `iat`
    ///
    /// Tokens without an `email` claim cannot appear on the revocation list
    /// and are never revoked.
    pub async fn verify(&self, token: &str) -> AuthResult<Claims> {
        let (key, revocations) = tokio::try_join!(self.public_key(), self.revocation_map())?;

        let claims = self
            .decode(token, key)
            .await
            .and_then(|claims| {
                claims.validate_time_window(jsonwebtoken::get_current_timestamp())?;
                Ok(claims)
            })
            .inspect_err(|e| {
                tracing::debug!(kind = %e.kind, error = %e, "Token rejected");
            })?;

        let subject = claims.subject_hash();
        let revocations = revocations.as_deref().and_then(Option::as_ref);

        if let (Some(revocations), Some(subject)) = (revocations, subject.as_deref())
            && let Some(revoked_at) = revocations.revoked_at(subject)
            && claims.is_revoked_at(revoked_at)
        {
            tracing::debug!(subject = %subject, revoked_at, "Token revoked by remote");
            return Err(AuthError::revoked());
        }

        tracing::debug!(subject = ?subject, "Token verified");
        Ok(claims)
    }

    /// Drops the cached key and revocation list.
    pub fn clear_cache(&self) {
        self.keys.clear();
        if let Some(revocations) = &self.revocations {
            revocations.clear();
        }
    }

    async fn public_key(&self) -> AuthResult<Arc<PublicKey>> {
        self.keys.get(PUBLIC_KEY_CACHE_KEY).await
    }

    /// The cached revocation list. An authority that answered with no list
    /// is stored as `None` and means nothing is revoked.
    async fn revocation_map(&self) -> AuthResult<Option<Arc<Option<RevocationMap>>>> {
        match &self.revocations {
            Some(cache) => cache.get(EXPIRED_LIST_CACHE_KEY).await.map(Some),
            None => Ok(None),
        }
    }

    async fn decode(&self, token: &str, key: Arc<PublicKey>) -> AuthResult<Claims> {
        if token.is_empty() {
            return Err(AuthError::malformed("jwt must be provided"));
        }

        let token = token.to_string();
        let validation = self.validation.clone();
        let data = tokio::task::spawn_blocking(move || {
            jsonwebtoken::decode::<Claims>(&token, key.decoding_key(), &validation)
        })
        .await??;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use tokio::time::Instant;

    use crate::error::ErrorKind;
    use crate::test_support::{PUBLIC_KEY_PEM, StaticJsonFetcher, now, sign, sign_with_other_key};
    use crate::token::claims::subject_hash;

    const KEY_URL: &str = "http://authority.test/auth/public-key";
    const EXPIRED_URL: &str = "http://authority.test/auth/expired";

    fn key_response() -> serde_json::Value {
        json!({ "data": { "publicKey": PUBLIC_KEY_PEM } })
    }

    fn verifier(fetcher: StaticJsonFetcher, check_expired_list: bool) -> TokenVerifier {
        let config =
            ClientConfig::new("http://authority.test").with_check_expired_list(check_expired_list);
        TokenVerifier::with_fetcher(&config, Arc::new(fetcher)).unwrap()
    }

    fn key_only() -> TokenVerifier {
        verifier(
            StaticJsonFetcher::new().with_response(KEY_URL, key_response()),
            false,
        )
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let payload = json!({ "email": "chet@scalehaus.io", "expiresIn": "30d", "iat": now() });
        let token = sign(&payload);

        let claims = key_only().verify(&token).await.unwrap();
        assert_eq!(claims.email(), Some("chet@scalehaus.io"));
        assert_eq!(claims.get("expiresIn"), Some(&json!("30d")));
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_verify_expired_token() {
        let token = sign(&json!({ "email": "a@b.c", "iat": now() - 120, "exp": now() - 60 }));

        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expired);
        assert_eq!(err.status_code, 401);
        assert_eq!(err.message, "jwt expired");
    }

    #[tokio::test]
    async fn test_verify_not_yet_valid_token() {
        let token = sign(&json!({ "email": "a@b.c", "nbf": now() + 3600 }));

        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotYetValid);
        assert_eq!(err.status_code, 401);
    }

    #[tokio::test]
    async fn test_verify_malformed_token() {
        let verifier = key_only();

        let err = verifier.verify("not-a-token").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.message, "jwt malformed");

        let err = verifier.verify("").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.message, "jwt must be provided");
    }

    #[tokio::test]
    async fn test_verify_expires_at_current_second() {
        let token = sign(&json!({ "email": "a@b.c", "exp": now() }));

        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expired);
    }

    #[tokio::test]
    async fn test_verify_accepts_payload_without_email() {
        let payload = json!({ "sub": "svc", "iat": now() });
        let token = sign(&payload);

        let claims = key_only().verify(&token).await.unwrap();
        assert_eq!(claims.email(), None);
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_verify_accepts_fractional_time_claims() {
        let iat = now() as f64 - 0.5;
        let payload = json!({ "email": "a@b.c", "iat": iat, "exp": now() as f64 + 60.5 });
        let token = sign(&payload);

        let claims = key_only().verify(&token).await.unwrap();
        assert_eq!(claims.iat(), Some(iat as i64));
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);

        let token = sign(&json!({ "email": "a@b.c", "exp": now() as f64 - 0.5 }));
        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expired);
    }

    #[tokio::test]
    async fn test_verify_rejects_non_numeric_exp() {
        let token = sign(&json!({ "email": "a@b.c", "exp": "tomorrow" }));

        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.message, "invalid exp value");
    }

    #[tokio::test]
    async fn test_subject_without_email_is_never_revoked() {
        let fetcher = StaticJsonFetcher::new()
            .with_response(KEY_URL, key_response())
            .with_response(EXPIRED_URL, json!({ subject_hash(""): now() + 60 }));

        let token = sign(&json!({ "sub": "svc", "iat": now() }));
        assert!(verifier(fetcher, true).verify(&token).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_and_expired_list_resolved_concurrently() {
        let fetcher = StaticJsonFetcher::new()
            .with_response(KEY_URL, key_response())
            .with_response(EXPIRED_URL, json!({}))
            .with_delay(KEY_URL, Duration::from_millis(50))
            .with_delay(EXPIRED_URL, Duration::from_millis(50));
        let calls = fetcher.calls();
        let verifier = verifier(fetcher, true);
        let token = sign(&json!({ "email": "a@b.c" }));

        let start = Instant::now();
        verifier.verify(&token).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_list_failure_does_not_wait_for_key() {
        let fetcher = StaticJsonFetcher::new()
            .with_response(KEY_URL, key_response())
            .with_delay(KEY_URL, Duration::from_millis(200))
            .with_delay(EXPIRED_URL, Duration::from_millis(20));
        let verifier = verifier(fetcher, true);
        let token = sign(&json!({ "email": "a@b.c" }));

        let start = Instant::now();
        let err = verifier.verify(&token).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::RemoteFetchFailure);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_verify_wrong_key() {
        let token = sign_with_other_key(&json!({ "email": "a@b.c" }));

        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.message, "invalid signature");
    }

    #[tokio::test]
    async fn test_verify_rejects_other_algorithms() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({ "email": "a@b.c" }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let err = key_only().verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.message, "invalid algorithm");
    }

    #[tokio::test]
    async fn test_public_key_is_cached() {
        let fetcher = StaticJsonFetcher::new().with_response(KEY_URL, key_response());
        let calls = fetcher.calls();
        let verifier = verifier(fetcher, false);
        let token = sign(&json!({ "email": "a@b.c" }));

        for _ in 0..3 {
            verifier.verify(&token).await.unwrap();
        }
        verifier.verify("garbage").await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_key_fetch_failure() {
        let fetcher = StaticJsonFetcher::new();
        let calls = fetcher.calls();
        let verifier = verifier(fetcher, false);
        let token = sign(&json!({ "email": "a@b.c" }));

        for _ in 0..2 {
            let err = verifier.verify(&token).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::RemoteFetchFailure);
            assert_eq!(err.status_code, 500);
        }
        // Failures are not cached.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_revoked_when_issued_at_or_before_revocation() {
        let iat = now() - 10;
        let token = sign(&json!({ "email": "chet@scalehaus.io", "iat": iat }));

        for revoked_at in [iat, iat + 5] {
            let fetcher = StaticJsonFetcher::new()
                .with_response(KEY_URL, key_response())
                .with_response(
                    EXPIRED_URL,
                    json!({ subject_hash("chet@scalehaus.io"): revoked_at }),
                );

            let err = verifier(fetcher, true).verify(&token).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::RemoteRevoked);
            assert_eq!(err.status_code, 401);
            assert_eq!(err.message, "revoked by remote");
        }
    }

    #[tokio::test]
    async fn test_not_revoked_when_issued_after_revocation() {
        let iat = now() - 10;
        let token = sign(&json!({ "email": "chet@scalehaus.io", "iat": iat }));
        let fetcher = StaticJsonFetcher::new()
            .with_response(KEY_URL, key_response())
            .with_response(
                EXPIRED_URL,
                json!({ subject_hash("chet@scalehaus.io"): iat - 1 }),
            );

        let claims = verifier(fetcher, true).verify(&token).await.unwrap();
        assert_eq!(claims.iat(), Some(iat));
    }

    #[tokio::test]
    async fn test_unlisted_subject_and_empty_list_pass() {
        let token = sign(&json!({ "email": "chet@scalehaus.io", "iat": now() }));

        for body in [json!({ subject_hash("other@scalehaus.io"): now() }), json!(null)] {
            let fetcher = StaticJsonFetcher::new()
                .with_response(KEY_URL, key_response())
                .with_response(EXPIRED_URL, body);
            assert!(verifier(fetcher, true).verify(&token).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_expired_list_failure_fails_verification() {
        let fetcher = StaticJsonFetcher::new().with_response(KEY_URL, key_response());
        let token = sign(&json!({ "email": "a@b.c" }));

        let err = verifier(fetcher, true).verify(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteFetchFailure);
    }

    #[tokio::test]
    async fn test_expired_list_not_fetched_when_disabled() {
        let fetcher = StaticJsonFetcher::new()
            .with_response(KEY_URL, key_response())
            .with_response(EXPIRED_URL, json!({ subject_hash("a@b.c"): now() + 60 }));
        let calls = fetcher.calls();
        let verifier = verifier(fetcher, false);
        assert!(!verifier.checks_expired_list());

        verifier
            .verify(&sign(&json!({ "email": "a@b.c", "iat": now() })))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_refetches() {
        let fetcher = StaticJsonFetcher::new()
            .with_response(KEY_URL, key_response())
            .with_response(EXPIRED_URL, json!({}));
        let calls = fetcher.calls();
        let verifier = verifier(fetcher, true);
        let token = sign(&json!({ "email": "a@b.c" }));

        verifier.verify(&token).await.unwrap();
        verifier.clear_cache();
        verifier.verify(&token).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(matches!(
            TokenVerifier::new(&ClientConfig::default()),
            Err(ConfigError::Missing(_))
        ));
    }
}
