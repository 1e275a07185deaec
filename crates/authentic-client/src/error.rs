//! Classified authentication errors.
//!
//! Every failure in the verification pipeline is reported as an [`AuthError`]:
//! a plain value carrying the [`ErrorKind`], a human-readable message and the
//! HTTP status code the calling layer should render. The status code is
//! derived from the kind through a fixed table (see [`ErrorKind::status_code`]).

use std::fmt;

use serde::Serialize;

/// The classification of an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Empty token, bad structure, bad encoding or a signature that does not match.
    MalformedToken,
    /// The token's `exp` claim is in the past.
    Expired,
    /// The token's `nbf` claim is in the future.
    NotYetValid,
    /// The subject was revoked by the authority after the token was issued.
    RemoteRevoked,
    /// The authority could not be reached or answered with unusable data.
    RemoteFetchFailure,
    /// Anything else.
    Unclassified,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    ///
    /// Credential and claims failures map to `401 Unauthorized`; everything
    /// else maps to `500 Internal Server Error`.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::MalformedToken | Self::Expired | Self::NotYetValid | Self::RemoteRevoked => 401,
            Self::RemoteFetchFailure | Self::Unclassified => 500,
        }
    }

    /// Returns the kind name as exposed in error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedToken => "MalformedToken",
            Self::Expired => "Expired",
            Self::NotYetValid => "NotYetValid",
            Self::RemoteRevoked => "RemoteRevoked",
            Self::RemoteFetchFailure => "RemoteFetchFailure",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Returns `true` if the failure is attributable to the presented credential.
    #[must_use]
    pub const fn is_token_error(self) -> bool {
        matches!(
            self,
            Self::MalformedToken | Self::Expired | Self::NotYetValid | Self::RemoteRevoked
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified authentication error.
///
/// Serializes as `{"message": ..., "name": ..., "statusCode": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    /// The error message, preserved unchanged for diagnostics.
    pub message: String,

    /// The error classification.
    #[serde(rename = "name")]
    pub kind: ErrorKind,

    /// HTTP status code derived from `kind`.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl AuthError {
    /// Creates a new error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            status_code: kind.status_code(),
        }
    }

    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedToken, message)
    }

    /// Creates a new `Expired` error.
    #[must_use]
    pub fn expired() -> Self {
        Self::new(ErrorKind::Expired, "jwt expired")
    }

    /// Creates a new `NotYetValid` error.
    #[must_use]
    pub fn not_yet_valid() -> Self {
        Self::new(ErrorKind::NotYetValid, "jwt not active")
    }

    /// Creates a new `RemoteRevoked` error.
    #[must_use]
    pub fn revoked() -> Self {
        Self::new(ErrorKind::RemoteRevoked, "revoked by remote")
    }

    /// Creates a new `RemoteFetchFailure` error.
    #[must_use]
    pub fn remote_fetch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteFetchFailure, message)
    }

    /// Creates a new `Unclassified` error.
    #[must_use]
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unclassified, message)
    }

    /// Returns the error kind name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtKind;

        match err.kind() {
            JwtKind::ExpiredSignature => Self::expired(),
            JwtKind::ImmatureSignature => Self::not_yet_valid(),
            JwtKind::InvalidSignature => Self::malformed("invalid signature"),
            JwtKind::InvalidAlgorithm | JwtKind::MissingAlgorithm => {
                Self::malformed("invalid algorithm")
            }
            JwtKind::InvalidRsaKey(_) | JwtKind::InvalidKeyFormat => {
                Self::unclassified(err.to_string())
            }
            _ => Self::malformed("jwt malformed"),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::remote_fetch(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::unclassified(format!("verification task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind as JwtKind;

    #[test]
    fn test_status_table() {
        assert_eq!(ErrorKind::MalformedToken.status_code(), 401);
        assert_eq!(ErrorKind::Expired.status_code(), 401);
        assert_eq!(ErrorKind::NotYetValid.status_code(), 401);
        assert_eq!(ErrorKind::RemoteRevoked.status_code(), 401);
        assert_eq!(ErrorKind::RemoteFetchFailure.status_code(), 500);
        assert_eq!(ErrorKind::Unclassified.status_code(), 500);
    }

    #[test]
    fn test_constructors_attach_status() {
        let err = AuthError::malformed("jwt malformed");
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert_eq!(err.status_code, 401);
        assert_eq!(err.to_string(), "jwt malformed");

        let err = AuthError::remote_fetch("Could not retrieve public key");
        assert_eq!(err.status_code, 500);
        assert_eq!(err.name(), "RemoteFetchFailure");

        assert_eq!(AuthError::expired().message, "jwt expired");
        assert_eq!(AuthError::not_yet_valid().message, "jwt not active");
        assert_eq!(AuthError::revoked().message, "revoked by remote");
    }

    #[test]
    fn test_error_serialization_shape() {
        let json = serde_json::to_value(AuthError::malformed("jwt malformed")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "jwt malformed",
                "name": "MalformedToken",
                "statusCode": 401
            })
        );
    }

    #[test]
    fn test_jwt_error_classification() {
        let expired: AuthError = jsonwebtoken::errors::Error::from(JwtKind::ExpiredSignature).into();
        assert_eq!(expired.kind, ErrorKind::Expired);

        let immature: AuthError =
            jsonwebtoken::errors::Error::from(JwtKind::ImmatureSignature).into();
        assert_eq!(immature.kind, ErrorKind::NotYetValid);

        let signature: AuthError =
            jsonwebtoken::errors::Error::from(JwtKind::InvalidSignature).into();
        assert_eq!(signature.kind, ErrorKind::MalformedToken);
        assert_eq!(signature.message, "invalid signature");

        let structure: AuthError = jsonwebtoken::errors::Error::from(JwtKind::InvalidToken).into();
        assert_eq!(structure.kind, ErrorKind::MalformedToken);
        assert_eq!(structure.message, "jwt malformed");

        let key: AuthError = jsonwebtoken::errors::Error::from(JwtKind::InvalidKeyFormat).into();
        assert_eq!(key.kind, ErrorKind::Unclassified);
        assert_eq!(key.status_code, 500);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(ErrorKind::Expired.is_token_error());
        assert!(ErrorKind::RemoteRevoked.is_token_error());
        assert!(!ErrorKind::RemoteFetchFailure.is_token_error());
        assert_eq!(ErrorKind::NotYetValid.to_string(), "NotYetValid");
    }
}
