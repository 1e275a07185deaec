//! Error responses for the authentication adapter.
//!
//! `AuthError` renders as its JSON form (`{"message", "name", "statusCode"}`)
//! with the status from the kind table. Credential failures also carry a
//! `WWW-Authenticate` challenge.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;

/// Realm advertised in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "authentic";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header("invalid_token", &self.message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        } else {
            tracing::warn!(kind = %self.kind, error = %self.message, "Authentication unavailable");
        }

        (status, headers, Json(self)).into_response()
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="authentic", error="invalid_token", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!(
        "Bearer realm=\"{}\", error=\"{}\", error_description=\"{}\"",
        AUTH_REALM, error, escaped_desc
    )
}
