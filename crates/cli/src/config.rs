//! CLI configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required for `cart sync`
//! - `CARTBRIDGE_BACKEND_URL` - Base URL of the cart service
//! - `CARTBRIDGE_BACKEND_TOKEN` - Bearer token for the cart service
//! - `CARTBRIDGE_USER_ID` - User to sync as
//!
//! ## Optional
//! - `CARTBRIDGE_LOCAL_CART` - Guest cart file (default: cart.json)
//! - `CARTBRIDGE_SYNC_TIMEOUT_SECS` - Backend call deadline (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! Local commands (`show`, `add`, `remove`) only touch the guest cart file
//! and run without any backend configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use cartbridge_core::UserId;
use cartbridge_sync::backend::HttpBackendConfig;

/// Default backend call deadline in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default guest cart file.
const DEFAULT_LOCAL_CART: &str = "cart.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Cart service connection settings, if a backend is configured.
    pub backend: Option<HttpBackendConfig>,
    /// Path of the guest cart file.
    pub local_cart: PathBuf,
    /// User to sync as, if configured.
    pub user_id: Option<UserId>,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Backend settings are optional as a group: local commands never
        // reach the server. A URL without a token is still a hard error.
        let backend = match optional("CARTBRIDGE_BACKEND_URL") {
            Some(raw) => {
                let endpoint = Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "CARTBRIDGE_BACKEND_URL".to_string(),
                        e.to_string(),
                    )
                })?;
                let access_token = SecretString::from(required("CARTBRIDGE_BACKEND_TOKEN")?);

                let timeout_secs = match optional("CARTBRIDGE_SYNC_TIMEOUT_SECS") {
                    Some(raw) => raw.parse::<u64>().map_err(|e| {
                        ConfigError::InvalidEnvVar(
                            "CARTBRIDGE_SYNC_TIMEOUT_SECS".to_string(),
                            e.to_string(),
                        )
                    })?,
                    None => DEFAULT_TIMEOUT_SECS,
                };

                Some(HttpBackendConfig {
                    endpoint,
                    access_token,
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => None,
        };

        Ok(Self {
            backend,
            local_cart: optional("CARTBRIDGE_LOCAL_CART")
                .map_or_else(|| PathBuf::from(DEFAULT_LOCAL_CART), PathBuf::from),
            user_id: optional("CARTBRIDGE_USER_ID").map(UserId::new),
            sentry_dsn: optional("SENTRY_DSN"),
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
