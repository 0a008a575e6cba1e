//! Runtime settings: defaults, then a JSON file, then environment variables.
//!
//! ```rust,no_run
//! use agent_relay::config::Settings;
//!
//! # fn example() -> Result<(), agent_relay::Error> {
//! let settings = Settings::load(Some("agent-relay.json".as_ref()))?;
//! let client = settings.openai_client()?;
//! let config = settings.execution_config()?;
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod settings;

pub use env::{ENV_PREFIX, EnvSource};
pub use settings::Settings;

use thiserror::Error;

/// Errors that can occur while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The key with invalid value
        key: String,
        /// Error message
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
