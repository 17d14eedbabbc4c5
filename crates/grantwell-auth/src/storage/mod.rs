//! Storage traits for clients and issued credentials.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations (read-only)
//! - Refresh and access tokens
//!
//! # Implementations
//!
//! - [`memory`] - in-process stores
//! - `grantwell-auth-postgres` - PostgreSQL storage backend

pub mod client;
pub mod credential;
pub mod memory;

pub use client::ClientStorage;
pub use credential::CredentialStore;
pub use memory::{InMemoryClientStorage, InMemoryCredentialStore};
