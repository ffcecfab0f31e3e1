//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub listen: Option<String>,
    /// Override remote address, e.g. 10.0.0.2:80
    #[arg(long)]
    pub remote: Option<String>,
    /// Override outbound connect timeout (seconds)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Override idle I/O timeout (seconds)
    #[arg(long)]
    pub io_timeout_secs: Option<u64>,
    /// Buffer size for TCP relay (bytes)
    #[arg(long)]
    pub relay_buffer_size: Option<usize>,
    /// TCP listener backlog size
    #[arg(long)]
    pub connection_backlog: Option<u32>,
    /// Override maximum concurrent relays (0 = unlimited)
    #[arg(long)]
    pub max_connections: Option<usize>,
    /// Override graceful shutdown timeout (seconds)
    #[arg(long)]
    pub shutdown_timeout_secs: Option<u64>,
    /// Set TCP_NODELAY on relayed connections
    #[arg(long)]
    pub tcp_no_delay: Option<bool>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override log format (pretty/compact/json)
    #[arg(long)]
    pub log_format: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    }
    if let Some(v) = &overrides.remote {
        config.server.remote = v.clone();
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.server.connect_timeout_secs = v;
    }
    if let Some(v) = overrides.io_timeout_secs {
        config.server.io_timeout_secs = v;
    }
    if let Some(v) = overrides.relay_buffer_size {
        config.server.relay_buffer_size = v;
    }
    if let Some(v) = overrides.connection_backlog {
        config.server.connection_backlog = v;
    }
    if let Some(v) = overrides.max_connections {
        config.server.max_connections = if v == 0 { None } else { Some(v) };
    }
    if let Some(v) = overrides.shutdown_timeout_secs {
        config.server.shutdown_timeout_secs = v;
    }
    if let Some(v) = overrides.tcp_no_delay {
        config.tcp.no_delay = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.log_format {
        config.logging.format = Some(v.clone());
    }
}
