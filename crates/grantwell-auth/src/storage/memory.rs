//! In-memory storage implementations.
//!
//! Process-local stores used by tests and by single-node deployments that do
//! not need credentials to survive a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{ClientStorage, CredentialStore};
use crate::types::{AccessToken, Client, NewAccessToken, RefreshToken};

// =============================================================================
// Credential Store
// =============================================================================

#[derive(Debug, Default)]
struct CredentialTables {
    refresh_tokens: HashMap<String, RefreshToken>,
    access_tokens: HashMap<String, AccessToken>,
    last_access_token_id: i64,
}

impl CredentialTables {
    fn insert_access_token(&mut self, new: NewAccessToken) -> AuthResult<AccessToken> {
        if self.access_tokens.contains_key(&new.token) {
            return Err(AuthError::storage("Access token value already exists"));
        }

        self.last_access_token_id += 1;
        let token = AccessToken::from_new(self.last_access_token_id, new);
        self.access_tokens
            .insert(token.token.clone(), token.clone());
        Ok(token)
    }
}

/// In-memory credential store.
///
/// All tables sit behind one lock, so every write (including a rotation,
/// which touches both tables) is a single critical section.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<CredentialTables>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_refresh_token(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.tables.read().await.refresh_tokens.get(token).cloned())
    }

    async fn create_refresh_token(&self, token: &RefreshToken) -> AuthResult<()> {
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.contains_key(&token.token) {
            return Err(AuthError::storage("Refresh token value already exists"));
        }
        tables
            .refresh_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn create_access_token(&self, token: NewAccessToken) -> AuthResult<AccessToken> {
        self.tables.write().await.insert_access_token(token)
    }

    async fn rotate_refresh_token(
        &self,
        consumed: &str,
        successor: &RefreshToken,
        access: NewAccessToken,
    ) -> AuthResult<AccessToken> {
        let mut tables = self.tables.write().await;

        // Validate everything before the first mutation.
        if !tables.refresh_tokens.contains_key(consumed) {
            return Err(AuthError::invalid_grant("Refresh token not found"));
        }
        if successor.token != consumed && tables.refresh_tokens.contains_key(&successor.token) {
            return Err(AuthError::storage("Refresh token value already exists"));
        }
        if tables.access_tokens.contains_key(&access.token) {
            return Err(AuthError::storage("Access token value already exists"));
        }

        tables.refresh_tokens.remove(consumed);
        tables
            .refresh_tokens
            .insert(successor.token.clone(), successor.clone());
        tables.insert_access_token(access)
    }

    async fn find_access_token(&self, token: &str) -> AuthResult<Option<AccessToken>> {
        Ok(self.tables.read().await.access_tokens.get(token).cloned())
    }

    async fn count_access_tokens(&self) -> AuthResult<u64> {
        Ok(self.tables.read().await.access_tokens.len() as u64)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

// =============================================================================
// Client Storage
// =============================================================================

/// In-memory client registry, fixed at construction.
#[derive(Debug, Default, Clone)]
pub struct InMemoryClientStorage {
    clients: HashMap<String, Client>,
}

impl InMemoryClientStorage {
    /// Creates a registry from a list of clients.
    ///
    /// A later client with the same ID replaces an earlier one.
    #[must_use]
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.get(client_id).cloned())
    }
}
