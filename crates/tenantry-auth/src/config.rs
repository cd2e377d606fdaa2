//! Authorization store configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! scope_delimiter = ","
//!
//! [auth.sweeper]
//! enabled = true
//! interval = "5m"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::mapper::AuthorizationMapper;
use crate::resolver::DEFAULT_SCOPE_DELIMITER;

/// Root configuration for the authorization store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthStoreConfig {
    /// Delimiter used to join and split scope sets in flat records.
    pub scope_delimiter: String,

    /// Expiry sweeper configuration.
    pub sweeper: SweeperConfig,
}

impl Default for AuthStoreConfig {
    fn default() -> Self {
        Self {
            scope_delimiter: DEFAULT_SCOPE_DELIMITER.to_string(),
            sweeper: SweeperConfig::default(),
        }
    }
}

impl AuthStoreConfig {
    /// Builds a record mapper using the configured scope delimiter.
    #[must_use]
    pub fn mapper(&self) -> AuthorizationMapper {
        AuthorizationMapper::new(self.scope_delimiter.clone())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The scope delimiter is empty
    /// - The sweeper is enabled with a zero interval
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scope_delimiter.is_empty() {
            return Err(ConfigError::InvalidValue(
                "scope_delimiter cannot be empty".to_string(),
            ));
        }

        if self.sweeper.enabled && self.sweeper.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "sweeper.interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expiry sweeper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Run the periodic sweep.
    pub enabled: bool,

    /// Time between sweep passes.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}
