//! Configuration type definitions for the listener, relay, TCP and logging.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tcprelay_core::RelayOptions;

use crate::defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Relay options for every connection accepted by the server.
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions::new(self.server.remote.clone())
            .connect_timeout(Duration::from_secs(self.server.connect_timeout_secs))
            .io_timeout(Duration::from_secs(self.server.io_timeout_secs))
            .buffer_size(self.server.relay_buffer_size)
            .no_delay(self.tcp.no_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (ip:port).
    pub listen: String,
    /// Address every accepted connection is relayed to (host:port).
    pub remote: String,
    /// Timeout for establishing the outbound connection (seconds).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle timeout applied to every read and write on both legs (seconds).
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// Relay buffer size per direction (bytes).
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// TCP listener backlog (pending connections queue size).
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    /// Maximum concurrent relays (None = unlimited)
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// How long active relays may drain after shutdown is requested (seconds).
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) on both legs.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"tcprelay_core": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
