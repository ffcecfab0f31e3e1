//! Server error types.

use tcprelay_config::ConfigError;
use tcprelay_core::{ERROR_CONFIG, ERROR_IO, RelayError};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay: {0}")]
    Relay(#[from] RelayError),
    #[error("config: {0}")]
    Config(String),
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl ServerError {
    /// Get the error type string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Relay(err) => err.error_type(),
            ServerError::Config(_) => ERROR_CONFIG,
        }
    }
}
