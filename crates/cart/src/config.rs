//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `GOMARKET_CART_KEY` - Persistence key for the cart blob (default: `@GoMarket:cart`)
//! - `GOMARKET_DATA_DIR` - Directory used by `FileStore` (default: `.gomarket`)
//! - `GOMARKET_COALESCE_WRITES` - Persist only the newest pending snapshot (default: `true`)

use std::path::PathBuf;

use thiserror::Error;

/// Default persistence key for the cart blob.
pub const DEFAULT_STORAGE_KEY: &str = "@GoMarket:cart";

/// Default directory for file-backed persistence.
pub const DEFAULT_DATA_DIR: &str = ".gomarket";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Key the cart blob is stored under
    pub storage_key: String,
    /// Directory for `FileStore`
    pub data_dir: PathBuf,
    /// Skip superseded pending writes and persist only the newest snapshot
    pub coalesce_writes: bool,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            coalesce_writes: true,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage_key = lookup("GOMARKET_CART_KEY").unwrap_or(defaults.storage_key);
        if storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "GOMARKET_CART_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let data_dir = lookup("GOMARKET_DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map_or(defaults.data_dir, PathBuf::from);

        let coalesce_writes = match lookup("GOMARKET_COALESCE_WRITES") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "GOMARKET_COALESCE_WRITES".to_string(),
                    format!("expected true or false, got {raw:?}"),
                )
            })?,
            None => defaults.coalesce_writes,
        };

        Ok(Self {
            storage_key,
            data_dir,
            coalesce_writes,
        })
    }

    /// Override the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Toggle write coalescing.
    #[must_use]
    pub const fn with_coalesce_writes(mut self, coalesce: bool) -> Self {
        self.coalesce_writes = coalesce;
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
