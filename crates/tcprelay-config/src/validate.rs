//! Configuration validation logic.

use std::net::SocketAddr;

use tcprelay_core::options::validate_remote_addr;

use crate::Config;
use crate::defaults::{max_relay_buffer_size, min_relay_buffer_size};
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Validation("server.listen is empty".into()));
    }
    if config.server.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "server.listen '{}' is not an ip:port address",
            config.server.listen
        )));
    }
    validate_remote_addr(&config.server.remote)
        .map_err(|e| ConfigError::Validation(format!("server.remote: {e}")))?;
    if config.server.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.io_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.io_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.relay_buffer_size < min_relay_buffer_size() {
        return Err(ConfigError::Validation(format!(
            "server.relay_buffer_size must be >= {}",
            min_relay_buffer_size()
        )));
    }
    if config.server.relay_buffer_size > max_relay_buffer_size() {
        return Err(ConfigError::Validation(
            "server.relay_buffer_size must be <= 1MB".into(),
        ));
    }
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if config.server.max_connections == Some(0) {
        return Err(ConfigError::Validation(
            "server.max_connections must be > 0 (omit for unlimited)".into(),
        ));
    }
    let valid_formats = ["pretty", "compact", "json"];
    if let Some(format) = config.logging.format.as_deref()
        && !valid_formats.contains(&format)
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of: {:?}",
            valid_formats
        )));
    }
    let valid_outputs = ["stdout", "stderr"];
    if let Some(output) = config.logging.output.as_deref()
        && !valid_outputs.contains(&output)
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be one of: {:?}",
            valid_outputs
        )));
    }
    Ok(())
}
