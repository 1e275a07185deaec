//! # authentic-client
//!
//! Bearer token authentication against a remote key authority.
//!
//! A request's `Authorization: Bearer <token>` credential is verified with
//! RS256 against the public key published by the authority, optionally
//! checked against the authority's revocation list, and turned into
//! [`Claims`] or a classified [`AuthError`].
//!
//! ## Modules
//!
//! - [`config`] - Authority location, cache TTL and request timeout
//! - [`error`] - Classified errors and their HTTP status codes
//! - [`cache`] - Single-flight TTL cache
//! - [`fetch`] - Public key and revocation list fetchers
//! - [`token`] - Claims and the token verifier
//! - [`middleware`] - Axum extractors, error responses and CORS

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod middleware;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{Loader, TtlCache};
pub use config::{ClientConfig, ConfigError};
pub use error::{AuthError, ErrorKind};
pub use fetch::{HttpJsonFetcher, JsonFetcher, PublicKey, RevocationMap};
pub use middleware::{AuthState, BearerAuth, OptionalBearerAuth, cors_layer, parse_request};
pub use token::{Claims, TokenVerifier, subject_hash};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use authentic_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{ClientConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorKind};
    pub use crate::middleware::{
        AuthState, BearerAuth, OptionalBearerAuth, cors_layer, parse_request,
    };
    pub use crate::token::{Claims, TokenVerifier};
}
