//! Token generation.

pub mod factory;

pub use factory::{IssuedToken, MAX_TOKEN_LIFETIME, TOKEN_BYTES, TokenFactory};
