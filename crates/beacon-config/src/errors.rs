//! Configuration errors.

use thiserror::Error;

/// Result alias for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON or does not match [`crate::AppConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
