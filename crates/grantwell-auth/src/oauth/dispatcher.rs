//! Grant type dispatch.
//!
//! Maps the `grant_type` parameter of a token request to the registered
//! [`GrantHandler`]. Only grants that are both known and registered are
//! served; anything else is `unsupported_grant_type`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::grant::{GrantHandler, GrantRequest};
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::types::{Client, GrantType};

/// Routes token requests to grant handlers.
#[derive(Default, Clone)]
pub struct GrantDispatcher {
    handlers: HashMap<GrantType, Arc<dyn GrantHandler>>,
}

impl GrantDispatcher {
    /// Creates a dispatcher with no grants enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own grant type.
    /// A later registration for the same grant type replaces the earlier one.
    #[must_use]
    pub fn register(mut self, handler: Arc<dyn GrantHandler>) -> Self {
        self.handlers.insert(handler.grant_type(), handler);
        self
    }

    /// Returns true if a handler is registered for `grant_type`.
    #[must_use]
    pub fn supports(&self, grant_type: GrantType) -> bool {
        self.handlers.contains_key(&grant_type)
    }

    /// Registered grant types, in declaration order.
    #[must_use]
    pub fn supported_grant_types(&self) -> Vec<GrantType> {
        GrantType::ALL
            .iter()
            .copied()
            .filter(|grant_type| self.supports(*grant_type))
            .collect()
    }

    /// Resolves the grant type of `request` and runs its handler.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `grant_type` is missing
    /// - `UnsupportedGrantType` if it is unknown or not registered
    /// - whatever the handler returns
    pub async fn dispatch(&self, request: &TokenRequest, client: &Client) -> AuthResult<TokenResponse> {
        let name = request.grant_type.trim();
        if name.is_empty() {
            return Err(AuthError::invalid_request("Missing grant_type parameter"));
        }

        let Some((grant_type, handler)) = name
            .parse::<GrantType>()
            .ok()
            .and_then(|grant_type| self.handlers.get(&grant_type).map(|h| (grant_type, h)))
        else {
            warn!(grant_type = name, "Unsupported grant type");
            return Err(AuthError::unsupported_grant_type(name));
        };

        debug!(
            grant_type = %grant_type,
            client_id = %client.client_id,
            "Dispatching grant"
        );

        let grant_request = GrantRequest::from_token_request(grant_type, request);
        handler.handle(&grant_request, client).await
    }
}

impl std::fmt::Debug for GrantDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantDispatcher")
            .field("grant_types", &self.supported_grant_types())
            .finish()
    }
}
