//! Opaque token generation.
//!
//! Token values carry no structure; their meaning lives entirely in the
//! credential store. They are 256-bit values from the thread-local CSPRNG,
//! encoded as unpadded base64url.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::error::AuthError;

/// Number of random bytes behind every token value.
pub const TOKEN_BYTES: usize = 32;

/// Longest lifetime any configured token may have.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::days(3650);

/// A freshly generated token value with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Opaque token value.
    pub value: String,
    /// Issue time.
    pub issued_at: OffsetDateTime,
    /// Expiry time (`issued_at + ttl`).
    pub expires_at: OffsetDateTime,
}

/// Generates opaque token values.
///
/// Uniqueness is overwhelmingly likely but not checked here. A collision
/// surfaces as a storage error on insert and is not retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenFactory;

impl TokenFactory {
    /// Creates a new factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates a token valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// See [`issue_at`](Self::issue_at).
    pub fn issue(&self, ttl: Duration) -> AuthResult<IssuedToken> {
        self.issue_at(OffsetDateTime::now_utc(), ttl)
    }

    /// Generates a token valid for `ttl` from `now`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `now + ttl` is not a representable instant.
    pub fn issue_at(&self, now: OffsetDateTime, ttl: Duration) -> AuthResult<IssuedToken> {
        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            AuthError::configuration(format!(
                "Token lifetime of {}s overflows the expiry time",
                ttl.whole_seconds()
            ))
        })?;

        Ok(IssuedToken {
            value: Self::generate_value(),
            issued_at: now,
            expires_at,
        })
    }

    /// Generates a cryptographically secure random token value.
    ///
    /// Returns a 256-bit random value encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_value() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
