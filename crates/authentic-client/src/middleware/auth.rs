//! Bearer token extraction.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::AuthResult;
use crate::config::{ClientConfig, ConfigError};
use crate::error::AuthError;
use crate::token::{Claims, TokenVerifier};

/// Length of the `Bearer ` scheme prefix stripped from the header.
const SCHEME_PREFIX_LEN: usize = 7;

/// Authenticates a request from its headers.
///
/// Returns `Ok(None)` when no `Authorization` header is present. Otherwise the
/// first seven bytes of the header value are dropped and the rest is verified
/// as a token. The scheme itself is not checked.
///
/// # Errors
///
/// Returns the verifier's error. A header shorter than the scheme prefix is
/// an empty token; bytes that are not UTF-8 are replaced, so such a token
/// fails as malformed.
pub async fn parse_request(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> AuthResult<Option<Claims>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .as_bytes()
        .get(SCHEME_PREFIX_LEN..)
        .map(String::from_utf8_lossy)
        .unwrap_or_default();

    verifier.verify(&token).await.map(Some)
}

// =============================================================================
// Auth State
// =============================================================================

/// State required by the bearer extractors.
///
/// Include it in your application state and expose it through `FromRef`.
///
/// ```ignore
/// #[derive(Clone)]
/// struct AppState {
///     auth: AuthState,
/// }
///
/// impl FromRef<AppState> for AuthState {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthState {
    /// Shared token verifier.
    pub verifier: Arc<TokenVerifier>,
}

impl AuthState {
    /// Wraps an existing verifier.
    #[must_use]
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            verifier: Arc::new(verifier),
        }
    }

    /// Builds a verifier for `config` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(TokenVerifier::new(config)?))
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// Axum extractor yielding the caller's claims if a credential is present.
///
/// Requests without an `Authorization` header pass through with `None`; a
/// credential that fails verification rejects the request.
///
/// ```ignore
/// async fn handler(OptionalBearerAuth(claims): OptionalBearerAuth) -> String {
///     match claims {
///         Some(claims) => format!("Hello, {}!", claims.email().unwrap_or("stranger")),
///         None => "Hello, anonymous!".to_string(),
///     }
/// }
/// ```
pub struct OptionalBearerAuth(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalBearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let claims = parse_request(&auth_state.verifier, &parts.headers).await?;
        Ok(OptionalBearerAuth(claims))
    }
}

/// Axum extractor that requires a valid credential.
///
/// A missing `Authorization` header is rejected as an empty token.
pub struct BearerAuth(pub Claims);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalBearerAuth(claims) =
            OptionalBearerAuth::from_request_parts(parts, state).await?;
        claims
            .map(BearerAuth)
            .ok_or_else(|| AuthError::malformed("jwt must be provided"))
    }
}
