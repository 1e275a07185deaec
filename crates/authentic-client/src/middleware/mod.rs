//! HTTP adapter for bearer token authentication.
//!
//! This module provides:
//!
//! - [`parse_request`] for framework-independent header handling
//! - Axum extractors that verify the `Authorization: Bearer` credential
//! - `IntoResponse` for [`AuthError`](crate::error::AuthError)
//! - [`cors_layer`] allowing the `Authorization` header cross-origin
//!
//! # Example
//!
//! ```ignore
//! use axum::{Json, Router, routing::get};
//! use authentic_client::middleware::{AuthState, OptionalBearerAuth, cors_layer};
//!
//! async fn whoami(OptionalBearerAuth(claims): OptionalBearerAuth) -> Json<Option<Claims>> {
//!     Json(claims)
//! }
//!
//! let app = Router::new()
//!     .route("/", get(whoami))
//!     .layer(cors_layer())
//!     .with_state(AuthState::from_config(&config)?);
//! ```

pub mod auth;
pub mod cors;
pub mod error;

pub use auth::{AuthState, BearerAuth, OptionalBearerAuth, parse_request};
pub use cors::cors_layer;
pub use error::AUTH_REALM;
