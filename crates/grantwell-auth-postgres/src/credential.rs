//! Arc-owning credential store for use behind `Arc<dyn CredentialStore>`.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use grantwell_auth::storage::CredentialStore;
use grantwell_auth::types::{AccessToken, NewAccessToken, RefreshToken};
use grantwell_auth::{AuthError, AuthResult};

use crate::PgPool;
use crate::token::TokenStorage;

/// PostgreSQL-backed credential store.
///
/// Owns an `Arc<PgPool>` instead of borrowing, so it can be shared across
/// request handlers.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    /// Create a new store over the given pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn tokens(&self) -> TokenStorage<'_> {
        TokenStorage::new(&self.pool)
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.tokens().find_refresh_token(token).await?)
    }

    async fn create_refresh_token(&self, token: &RefreshToken) -> AuthResult<()> {
        Ok(self.tokens().create_refresh_token(token).await?)
    }

    async fn create_access_token(&self, token: NewAccessToken) -> AuthResult<AccessToken> {
        Ok(self.tokens().create_access_token(token).await?)
    }

    async fn rotate_refresh_token(
        &self,
        consumed: &str,
        successor: &RefreshToken,
        access: NewAccessToken,
    ) -> AuthResult<AccessToken> {
        self.tokens()
            .rotate_refresh_token(consumed, successor, access)
            .await?
            .ok_or_else(|| {
                debug!(client_id = %successor.client_id, "Refresh token consumed concurrently");
                AuthError::invalid_grant("Refresh token not found")
            })
    }

    async fn find_access_token(&self, token: &str) -> AuthResult<Option<AccessToken>> {
        Ok(self.tokens().find_access_token(token).await?)
    }

    async fn count_access_tokens(&self) -> AuthResult<u64> {
        Ok(self.tokens().count_access_tokens().await?)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        Ok(self
            .tokens()
            .delete_expired_refresh_tokens(OffsetDateTime::now_utc())
            .await?)
    }
}
