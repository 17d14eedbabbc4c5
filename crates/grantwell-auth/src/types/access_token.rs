//! Access token domain type.
//!
//! Access tokens are created exactly once per successful grant and never
//! modified afterwards. They expire on their own; nothing in this crate
//! deletes them.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::scope::Scope;

/// An access token that has not been persisted yet.
///
/// The credential store assigns the row id when it inserts the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessToken {
    /// Opaque token value.
    pub token: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// User the token acts for, if any.
    pub user_id: Option<String>,
    /// Effective scope of the token.
    pub scope: Scope,
    /// Value of the refresh token issued alongside.
    pub refresh_token: Option<String>,
    /// Issue time.
    pub created_at: OffsetDateTime,
    /// Expiry time.
    pub expires_at: OffsetDateTime,
}

/// A persisted access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Store-assigned row id.
    pub id: i64,

    /// Opaque token value. Unique across the store.
    pub token: String,

    /// Client ID that this token was issued to.
    pub client_id: String,

    /// User the token acts for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Effective scope of the token.
    pub scope: Scope,

    /// Refresh token value this access token was issued alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AccessToken {
    /// Builds the persisted record from a new token and its assigned id.
    #[must_use]
    pub fn from_new(id: i64, new: NewAccessToken) -> Self {
        Self {
            id,
            token: new.token,
            client_id: new.client_id,
            user_id: new.user_id,
            scope: new.scope,
            refresh_token: new.refresh_token,
            created_at: new.created_at,
            expires_at: new.expires_at,
        }
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}
