//! Domain types for clients and credentials.

pub mod access_token;
pub mod client;
pub mod refresh_token;

pub use access_token::{AccessToken, NewAccessToken};
pub use client::{Client, ClientValidationError, GrantType, UnknownGrantType};
pub use refresh_token::RefreshToken;
