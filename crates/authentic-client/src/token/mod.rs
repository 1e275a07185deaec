//! Token verification.
//!
//! This module provides:
//!
//! - [`Claims`], the decoded payload of a verified bearer token
//! - [`TokenVerifier`], which checks a token against the authority's public
//!   key and, optionally, its revocation list
//! - [`subject_hash`], the key under which the authority lists revoked subjects

pub mod claims;
pub mod verifier;

pub use claims::{Claims, subject_hash};
pub use verifier::{EXPIRED_LIST_CACHE_KEY, PUBLIC_KEY_CACHE_KEY, TokenVerifier};
