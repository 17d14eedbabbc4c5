//! OAuth 2.0 token endpoint logic.
//!
//! - [`token`] - request, response and error bodies
//! - [`grant`] - the handler contract every grant type implements
//! - [`dispatcher`] - grant type resolution
//! - [`refresh`] - the refresh token grant

pub mod dispatcher;
pub mod grant;
pub mod refresh;
pub mod token;

pub use dispatcher::GrantDispatcher;
pub use grant::{GrantHandler, GrantRequest};
pub use refresh::{RefreshGrantConfig, RefreshTokenGrant};
pub use token::{TokenError, TokenRequest, TokenResponse};
