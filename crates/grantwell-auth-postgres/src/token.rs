//! Refresh and access token storage.
//!
//! Token values are stored as issued and looked up by exact match. Scopes are
//! kept in their space-delimited string form.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;

use grantwell_auth::scope::Scope;
use grantwell_auth::types::{AccessToken, NewAccessToken, RefreshToken};

use crate::{PgPool, StorageResult, map_insert_error};

// =============================================================================
// Rows
// =============================================================================

type RefreshTokenTuple = (
    String,
    String,
    Option<String>,
    String,
    OffsetDateTime,
    OffsetDateTime,
);

type AccessTokenTuple = (
    i64,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

fn refresh_token_from_tuple(row: RefreshTokenTuple) -> RefreshToken {
    RefreshToken {
        token: row.0,
        client_id: row.1,
        user_id: row.2,
        scope: Scope::parse(&row.3),
        created_at: row.4,
        expires_at: row.5,
    }
}

fn access_token_from_tuple(row: AccessTokenTuple) -> AccessToken {
    AccessToken {
        id: row.0,
        token: row.1,
        client_id: row.2,
        user_id: row.3,
        scope: Scope::parse(&row.4),
        refresh_token: row.5,
        created_at: row.6,
        expires_at: row.7,
    }
}

// =============================================================================
// Token Storage
// =============================================================================

/// Token storage operations over a pool reference.
pub struct TokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenStorage<'a> {
    /// Create a new token storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a refresh token by its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_refresh_token(&self, token: &str) -> StorageResult<Option<RefreshToken>> {
        let row: Option<RefreshTokenTuple> = query_as(
            r#"
            SELECT token, client_id, user_id, scope, created_at, expires_at
            FROM oauth_refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(refresh_token_from_tuple))
    }

    /// Insert a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the value is already stored.
    pub async fn create_refresh_token(&self, token: &RefreshToken) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_refresh_token(&mut *conn, token).await
    }

    /// Insert an access token and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the value is already stored.
    pub async fn create_access_token(&self, token: NewAccessToken) -> StorageResult<AccessToken> {
        let mut conn = self.pool.acquire().await?;
        insert_access_token(&mut *conn, token).await
    }

    /// Consume `consumed`, store `successor`, and insert `access`, atomically.
    ///
    /// Returns `Ok(None)` without writing anything if `consumed` no longer
    /// exists. Concurrent calls for the same value serialize on the row lock
    /// taken by the delete; only the first one sees the row.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction is rolled back.
    pub async fn rotate_refresh_token(
        &self,
        consumed: &str,
        successor: &RefreshToken,
        access: NewAccessToken,
    ) -> StorageResult<Option<AccessToken>> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(String,)> = query_as(
            r#"
            DELETE FROM oauth_refresh_tokens
            WHERE token = $1
            RETURNING token
            "#,
        )
        .bind(consumed)
        .fetch_optional(&mut *tx)
        .await?;

        if deleted.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        insert_refresh_token(&mut *tx, successor).await?;
        let access = insert_access_token(&mut *tx, access).await?;

        tx.commit().await?;
        Ok(Some(access))
    }

    /// Find an access token by its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_access_token(&self, token: &str) -> StorageResult<Option<AccessToken>> {
        let row: Option<AccessTokenTuple> = query_as(
            r#"
            SELECT id, token, client_id, user_id, scope, refresh_token, created_at, expires_at
            FROM oauth_access_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(access_token_from_tuple))
    }

    /// Count stored access tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_access_tokens(&self) -> StorageResult<u64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM oauth_access_tokens")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Delete refresh tokens that expired before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired_refresh_tokens(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM oauth_refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_refresh_token(conn: &mut PgConnection, token: &RefreshToken) -> StorageResult<()> {
    query(
        r#"
        INSERT INTO oauth_refresh_tokens (token, client_id, user_id, scope, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&token.token)
    .bind(&token.client_id)
    .bind(&token.user_id)
    .bind(token.scope.to_string())
    .bind(token.created_at)
    .bind(token.expires_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_insert_error(e, "Refresh token"))?;

    Ok(())
}

async fn insert_access_token(conn: &mut PgConnection, token: NewAccessToken) -> StorageResult<AccessToken> {
    let (id,): (i64,) = query_as(
        r#"
        INSERT INTO oauth_access_tokens
            (token, client_id, user_id, scope, refresh_token, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(&token.token)
    .bind(&token.client_id)
    .bind(&token.user_id)
    .bind(token.scope.to_string())
    .bind(&token.refresh_token)
    .bind(token.created_at)
    .bind(token.expires_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_insert_error(e, "Access token"))?;

    Ok(AccessToken::from_new(id, token))
}
