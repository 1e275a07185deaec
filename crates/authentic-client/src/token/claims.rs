//! Verified token claims.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::AuthResult;
use crate::error::AuthError;

/// Payload of a verified bearer token.
///
/// The payload is kept exactly as signed; accessors read the well-known
/// fields without requiring them. Serializes back to the original payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims {
    payload: Map<String, Value>,
}

impl Claims {
    /// Creates empty claims.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload field.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Subject email address, if the payload carries one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.payload.get("email").and_then(Value::as_str)
    }

    /// Issued at (seconds since epoch, fractions truncated).
    #[must_use]
    pub fn iat(&self) -> Option<i64> {
        self.numeric("iat").map(|secs| secs as i64)
    }

    /// Expiration time (seconds since epoch, fractions truncated).
    #[must_use]
    pub fn exp(&self) -> Option<i64> {
        self.numeric("exp").map(|secs| secs as i64)
    }

    /// Not before (seconds since epoch, fractions truncated).
    #[must_use]
    pub fn nbf(&self) -> Option<i64> {
        self.numeric("nbf").map(|secs| secs as i64)
    }

    /// Returns a payload field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// The full payload.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Consumes the claims, returning the payload.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.payload
    }

    /// The revocation list key for this subject, if it has an email.
    #[must_use]
    pub fn subject_hash(&self) -> Option<String> {
        self.email().map(subject_hash)
    }

    /// Checks `nbf` and `exp` against `now` (seconds since epoch).
    ///
    /// A token is not yet valid while `nbf > now` and expired once
    /// `now >= exp`. Absent claims are not checked.
    ///
    /// # Errors
    ///
    /// `NotYetValid` or `Expired` for a violated window, `MalformedToken` if
    /// either claim is present but not a number.
    pub fn validate_time_window(&self, now: u64) -> AuthResult<()> {
        let now = now as f64;

        if let Some(nbf) = self.time_claim("nbf")?
            && nbf > now
        {
            return Err(AuthError::not_yet_valid());
        }

        if let Some(exp) = self.time_claim("exp")?
            && now >= exp
        {
            return Err(AuthError::expired());
        }

        Ok(())
    }

    /// Returns `true` if a revocation at `revoked_at` covers this token.
    ///
    /// Tokens issued at or before the revocation time are revoked. A token
    /// without a numeric `iat` counts as issued at the epoch.
    #[must_use]
    pub fn is_revoked_at(&self, revoked_at: i64) -> bool {
        self.numeric("iat").unwrap_or(0.0) <= revoked_at as f64
    }

    fn numeric(&self, name: &str) -> Option<f64> {
        self.payload.get(name).and_then(Value::as_f64)
    }

    fn time_claim(&self, name: &str) -> AuthResult<Option<f64>> {
        match self.payload.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| AuthError::malformed(format!("invalid {name} value"))),
        }
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(payload: Map<String, Value>) -> Self {
        Self { payload }
    }
}

/// Lowercase hex SHA-256 of the subject email.
#[must_use]
pub fn subject_hash(email: &str) -> String {
    hex::encode(Sha256::digest(email.as_bytes()))
}
