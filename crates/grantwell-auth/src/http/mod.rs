//! Axum HTTP handlers for OAuth endpoints.

pub mod token;

pub use token::{TOKEN_PATH, TokenState, token_handler, token_router};
