//! Client storage trait.
//!
//! Read-only view of client registrations used by the token endpoint to
//! authenticate callers.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage trait for OAuth client lookups.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its client ID.
    ///
    /// # Returns
    ///
    /// Returns `Some(client)` if found, `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Verifies a client's secret.
    ///
    /// # Returns
    ///
    /// Returns `true` if the secret matches, `false` if it does not or the
    /// client is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        Ok(self
            .find_by_client_id(client_id)
            .await?
            .is_some_and(|client| client.verify_secret(secret)))
    }
}
