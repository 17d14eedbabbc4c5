//! Authorization server configuration.
//!
//! Token lifetimes, the rotation policy, and the set of enabled grant types.
//! Durations use humantime notation (`"1h"`, `"14d"`).
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.oauth]
//! access_token_lifetime = "1h"
//! refresh_token_lifetime = "14d"
//! refresh_token_rotation = false
//! grant_types = ["refresh_token"]
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::oauth::refresh::RefreshGrantConfig;
use crate::token::MAX_TOKEN_LIFETIME;
use crate::types::GrantType;

/// Root authorization configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth 2.0 configuration.
    pub oauth: OAuthConfig,
}

/// OAuth 2.0 token endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Access token lifetime. Reported to clients as `expires_in`.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Lifetime of refresh tokens issued on rotation.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Rotate refresh tokens on use.
    /// When enabled, each exchange consumes the presented refresh token and
    /// returns a new one. When disabled, the presented token stays valid
    /// until it expires and is echoed back in the response.
    pub refresh_token_rotation: bool,

    /// Enabled OAuth 2.0 grant types.
    /// Known: "authorization_code", "password", "client_credentials", "refresh_token"
    pub grant_types: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(3600),            // 1 hour
            refresh_token_lifetime: Duration::from_secs(14 * 24 * 3600), // 14 days
            refresh_token_rotation: false,
            grant_types: vec!["refresh_token".to_string()],
        }
    }
}

impl OAuthConfig {
    /// Parses the configured grant type names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unknown grant type.
    pub fn enabled_grant_types(&self) -> Result<Vec<GrantType>, ConfigError> {
        self.grant_types
            .iter()
            .map(|name| {
                name.parse::<GrantType>().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "Invalid grant type: '{}'. Must be authorization_code, password, client_credentials, or refresh_token",
                        name
                    ))
                })
            })
            .collect()
    }

    /// Builds the refresh grant settings from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a lifetime exceeds
    /// [`MAX_TOKEN_LIFETIME`].
    pub fn refresh_grant_config(&self) -> Result<RefreshGrantConfig, ConfigError> {
        let access = bounded_lifetime("access_token_lifetime", self.access_token_lifetime)?;
        let refresh = bounded_lifetime("refresh_token_lifetime", self.refresh_token_lifetime)?;

        Ok(RefreshGrantConfig::default()
            .with_access_token_lifetime(access)
            .with_refresh_token_lifetime(refresh)
            .with_rotate_refresh_tokens(self.refresh_token_rotation))
    }
}

fn bounded_lifetime(name: &str, lifetime: Duration) -> Result<time::Duration, ConfigError> {
    time::Duration::try_from(lifetime)
        .ok()
        .filter(|lifetime| *lifetime <= MAX_TOKEN_LIFETIME)
        .ok_or_else(|| ConfigError::InvalidValue(format!("{name} must be at most 3650 days")))
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - A token lifetime is zero or out of range
    /// - An unknown grant type is listed
    ///
    /// Returns `ConfigError::Missing` if no grant type is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.oauth.refresh_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.oauth.grant_types.is_empty() {
            return Err(ConfigError::Missing("oauth.grant_types".to_string()));
        }

        self.oauth.enabled_grant_types()?;
        self.oauth.refresh_grant_config()?;

        Ok(())
    }
}
