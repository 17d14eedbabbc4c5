//! Refresh token domain type.
//!
//! A refresh token is the long-lived credential a client exchanges for new
//! access tokens. It is owned by the credential store and bound to the client
//! (and optionally the user) it was issued to.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::scope::Scope;

/// Refresh token as persisted by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// Opaque token value presented by the client. Unique across the store.
    pub token: String,

    /// Client ID that this token was issued to.
    pub client_id: String,

    /// User that authorized this token (None for client-only grants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Scope granted to this token.
    pub scope: Scope,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this token stops being usable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshToken {
    /// Returns `true` if the token is expired at `now`.
    ///
    /// A token is already expired at the exact instant of `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Returns `true` if this token was issued to the given client.
    #[must_use]
    pub fn is_issued_to(&self, client_id: &str) -> bool {
        self.client_id == client_id
    }
}
