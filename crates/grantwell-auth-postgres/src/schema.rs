//! Credential table definitions.

use sqlx_core::query::query;
use tracing::debug;

use crate::{PgPool, StorageResult};

/// DDL statements, applied in order. Every statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS oauth_refresh_tokens (
        id          BIGSERIAL PRIMARY KEY,
        token       TEXT NOT NULL UNIQUE,
        client_id   TEXT NOT NULL,
        user_id     TEXT,
        scope       TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS oauth_refresh_tokens_expires_at_idx
        ON oauth_refresh_tokens (expires_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS oauth_access_tokens (
        id             BIGSERIAL PRIMARY KEY,
        token          TEXT NOT NULL UNIQUE,
        client_id      TEXT NOT NULL,
        user_id        TEXT,
        scope          TEXT NOT NULL,
        refresh_token  TEXT,
        created_at     TIMESTAMPTZ NOT NULL,
        expires_at     TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Applies [`SCHEMA`] to the database.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in SCHEMA {
        query(statement).execute(pool).await?;
    }
    debug!(statements = SCHEMA.len(), "Credential schema ensured");
    Ok(())
}
