//! Credential storage trait.
//!
//! This module defines the storage interface for refresh and access tokens.
//!
//! # Consistency Requirements
//!
//! - Token values are unique per table; a duplicate insert is a storage error
//! - [`CredentialStore::rotate_refresh_token`] is atomic: either the consumed
//!   refresh token is gone and both new rows exist, or nothing changed
//! - Two concurrent rotations of the same refresh token never both succeed

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{AccessToken, NewAccessToken, RefreshToken};

/// Storage trait for issued credentials.
///
/// The grant handlers hold this as `Arc<dyn CredentialStore>`; the handle is
/// built once at start-up and shared by every request.
///
/// # Implementations
///
/// - [`InMemoryCredentialStore`](crate::storage::InMemoryCredentialStore) -
///   process-local reference implementation
/// - `grantwell-auth-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds a refresh token by its value.
    ///
    /// Returns the token regardless of expiry; callers check liveness and
    /// client binding themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>>;

    /// Stores a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`](crate::AuthError::Storage) if the token
    /// value already exists or the storage is unavailable.
    async fn create_refresh_token(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Stores a new access token and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`](crate::AuthError::Storage) if the token
    /// value already exists or the storage is unavailable.
    async fn create_access_token(&self, token: NewAccessToken) -> AuthResult<AccessToken>;

    /// Exchanges a refresh token for its successor in one atomic step.
    ///
    /// Deletes `consumed`, inserts `successor` and inserts `access`. The
    /// caller that manages to delete `consumed` is the only one that issues.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidGrant`](crate::AuthError::InvalidGrant) if
    ///   `consumed` no longer exists (already exchanged by a concurrent request)
    /// - [`AuthError::Storage`](crate::AuthError::Storage) on constraint
    ///   violations or unavailable storage
    ///
    /// In every error case nothing is written.
    async fn rotate_refresh_token(
        &self,
        consumed: &str,
        successor: &RefreshToken,
        access: NewAccessToken,
    ) -> AuthResult<AccessToken>;

    /// Finds an access token by its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_access_token(&self, token: &str) -> AuthResult<Option<AccessToken>>;

    /// Number of access token rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn count_access_tokens(&self) -> AuthResult<u64>;

    /// Deletes expired refresh tokens.
    ///
    /// # Returns
    ///
    /// Returns the number of tokens deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
