//! CORS layer for authenticated endpoints.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};

/// Returns a CORS layer that accepts any origin and allows the
/// `Authorization`, `Accept` and `Content-Type` request headers.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
}
