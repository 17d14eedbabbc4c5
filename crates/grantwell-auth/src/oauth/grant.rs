//! Grant handler contract.
//!
//! Every grant type implements [`GrantHandler`]. The dispatcher resolves the
//! `grant_type` parameter, builds a [`GrantRequest`] and hands it over together
//! with the already-authenticated client.

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::scope::Scope;
use crate::types::{Client, GrantType};

/// A parsed token request for one grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    /// Resolved grant type.
    pub grant_type: GrantType,

    /// Presented refresh token value.
    pub refresh_token: Option<String>,

    /// Requested scope. `None` when the parameter is absent or blank.
    pub scope: Option<Scope>,
}

impl GrantRequest {
    /// Builds a grant request from the raw form parameters.
    #[must_use]
    pub fn from_token_request(grant_type: GrantType, request: &TokenRequest) -> Self {
        Self {
            grant_type,
            refresh_token: request.refresh_token.clone(),
            scope: request
                .scope
                .as_deref()
                .map(Scope::parse)
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Handler for a single grant type.
///
/// Implementations return `Ok` for an issued credential set and `Err` for a
/// rejection. A rejection must not leave any write behind.
#[async_trait]
pub trait GrantHandler: Send + Sync {
    /// The grant type this handler serves.
    fn grant_type(&self) -> GrantType;

    /// Processes one request for the authenticated `client`.
    async fn handle(&self, request: &GrantRequest, client: &Client) -> AuthResult<TokenResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_scope_is_absent() {
        let request = TokenRequest {
            grant_type: "refresh_token".to_string(),
            refresh_token: Some("test_token".to_string()),
            scope: Some("  ".to_string()),
            ..Default::default()
        };

        let grant = GrantRequest::from_token_request(GrantType::RefreshToken, &request);
        assert!(grant.scope.is_none());
        assert_eq!(grant.refresh_token.as_deref(), Some("test_token"));
    }

    #[test]
    fn test_scope_is_parsed() {
        let request = TokenRequest {
            grant_type: "refresh_token".to_string(),
            scope: Some("foo bar foo".to_string()),
            ..Default::default()
        };

        let grant = GrantRequest::from_token_request(GrantType::RefreshToken, &request);
        assert_eq!(grant.scope, Some(Scope::parse("foo bar")));
    }
}
