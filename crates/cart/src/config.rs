//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (for ledger-backed commands)
//! - `VELOURE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `VELOURE_CART_PATH` - Cart document path (default: `.veloure/cart.json`)
//! - `VELOURE_STOCK_MAX_ATTEMPTS` - Compare-and-swap attempts per reservation (default: 3)
//! - `VELOURE_LEDGER_TIMEOUT_MS` - Timeout for each ledger call (default: 5000)
//! - `VELOURE_STOCK_BACKOFF_MS` - Base backoff between lost races (default: 0, disabled)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::reservation::RetryPolicy;

const DEFAULT_CART_PATH: &str = ".veloure/cart.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Location of the persisted cart
    pub cart_path: PathBuf,
    /// Ledger retry and timeout policy
    pub retry: RetryPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(&lookup, "VELOURE_DATABASE_URL");
        let cart_path = PathBuf::from(get_env_or_default(
            &lookup,
            "VELOURE_CART_PATH",
            DEFAULT_CART_PATH,
        ));

        let max_attempts: u32 = parse_env(&lookup, "VELOURE_STOCK_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "VELOURE_STOCK_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let timeout_ms: u64 = parse_env(&lookup, "VELOURE_LEDGER_TIMEOUT_MS", 5000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "VELOURE_LEDGER_TIMEOUT_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        let backoff_ms: u64 = parse_env(&lookup, "VELOURE_STOCK_BACKOFF_MS", 0)?;

        Ok(Self {
            database_url,
            cart_path,
            retry: RetryPolicy {
                max_attempts,
                call_timeout: Duration::from_millis(timeout_ms),
                base_backoff: Duration::from_millis(backoff_ms),
            },
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }

    /// The database URL, for commands that talk to the ledger.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no database URL was configured.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("VELOURE_DATABASE_URL".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(
    lookup: &impl Fn(&str) -> Option<String>,
    primary_key: &str,
) -> Option<SecretString> {
    lookup(primary_key)
        .or_else(|| lookup("DATABASE_URL"))
        .map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, using `default` when unset.
fn parse_env<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
