pub mod config;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{GrantwellServer, ServerBuilder, build_app, build_credential_store, build_dispatcher};
