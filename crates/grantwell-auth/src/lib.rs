//! # grantwell-auth
//!
//! Token endpoint of the Grantwell OAuth 2.0 authorization server.
//!
//! This crate provides:
//! - the refresh token grant (RFC 6749 Section 6), with optional rotation
//! - a grant dispatcher over a closed set of grant types
//! - opaque token generation
//! - storage traits for clients and issued credentials, plus in-memory stores
//! - the axum handler for `POST /v1/oauth/tokens`
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, rotation policy, enabled grants
//! - [`oauth`] - Grant handlers and dispatch
//! - [`scope`] - Space-delimited scope sets
//! - [`token`] - Token value generation
//! - [`storage`] - Storage traits for auth-related data
//! - [`http`] - Axum HTTP handlers for OAuth endpoints

pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod scope;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, OAuthConfig};
pub use error::{AuthError, ErrorCategory};
pub use http::{TOKEN_PATH, TokenState, token_handler, token_router};
pub use oauth::{
    GrantDispatcher, GrantHandler, GrantRequest, RefreshGrantConfig, RefreshTokenGrant,
    TokenError, TokenRequest, TokenResponse,
};
pub use scope::Scope;
pub use storage::{ClientStorage, CredentialStore, InMemoryClientStorage, InMemoryCredentialStore};
pub use types::{AccessToken, Client, ClientValidationError, GrantType, NewAccessToken, RefreshToken};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use grantwell_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError, OAuthConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{TokenState, token_router};
    pub use crate::oauth::{
        GrantDispatcher, GrantHandler, GrantRequest, RefreshGrantConfig, RefreshTokenGrant,
        TokenRequest, TokenResponse,
    };
    pub use crate::scope::Scope;
    pub use crate::storage::{
        ClientStorage, CredentialStore, InMemoryClientStorage, InMemoryCredentialStore,
    };
    pub use crate::types::{AccessToken, Client, GrantType, NewAccessToken, RefreshToken};
}
