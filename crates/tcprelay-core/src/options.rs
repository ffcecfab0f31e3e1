//! Per-relay options.

use std::time::Duration;

use crate::defaults::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_IO_TIMEOUT_SECS, DEFAULT_RELAY_BUFFER_SIZE,
    DEFAULT_TCP_NO_DELAY, MAX_RELAY_BUFFER_SIZE, MIN_RELAY_BUFFER_SIZE,
};
use crate::error::RelayError;

/// Everything a relay needs besides the inbound connection itself.
///
/// Immutable for the lifetime of one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    /// Outbound target in `host:port` form.
    pub remote_addr: String,
    /// Maximum wait for the outbound connection to be established.
    pub connect_timeout: Duration,
    /// Maximum duration of every individual read and write, on both legs.
    pub io_timeout: Duration,
    /// Size of the buffer each direction reuses across iterations.
    pub buffer_size: usize,
    /// Set TCP_NODELAY on the outbound socket.
    pub no_delay: bool,
}

impl RelayOptions {
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            io_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            no_delay: DEFAULT_TCP_NO_DELAY,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    /// Reject options a relay cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        validate_remote_addr(&self.remote_addr)?;
        if self.connect_timeout.is_zero() {
            return Err(RelayError::InvalidOptions(
                "connect_timeout must be > 0".into(),
            ));
        }
        if self.io_timeout.is_zero() {
            return Err(RelayError::InvalidOptions("io_timeout must be > 0".into()));
        }
        if !(MIN_RELAY_BUFFER_SIZE..=MAX_RELAY_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(RelayError::InvalidOptions(format!(
                "buffer_size must be {MIN_RELAY_BUFFER_SIZE}..={MAX_RELAY_BUFFER_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Check that `addr` looks like `host:port` with a numeric port.
///
/// Host resolution is left to the dial; IPv6 literals must be bracketed.
pub fn validate_remote_addr(addr: &str) -> Result<(), RelayError> {
    if addr.trim().is_empty() {
        return Err(RelayError::InvalidOptions("remote address is empty".into()));
    }
    if addr.trim() != addr {
        return Err(RelayError::InvalidOptions(format!(
            "remote address '{addr}' has surrounding whitespace"
        )));
    }
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(RelayError::InvalidOptions(format!(
            "remote address '{addr}' is missing a port"
        )));
    };
    if host.is_empty() {
        return Err(RelayError::InvalidOptions(format!(
            "remote address '{addr}' is missing a host"
        )));
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(RelayError::InvalidOptions(format!(
            "remote address '{addr}': IPv6 hosts must be bracketed"
        )));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(RelayError::InvalidOptions(format!(
            "remote address '{addr}' has an invalid port"
        ))),
        Ok(_) => Ok(()),
    }
}
