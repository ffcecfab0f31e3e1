//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default outbound connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default idle timeout in seconds, applied to every read and every write.
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 300;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default relay buffer size per direction (32 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 32768;
/// Smallest accepted relay buffer size.
pub const MIN_RELAY_BUFFER_SIZE: usize = 1024;
/// Largest accepted relay buffer size.
pub const MAX_RELAY_BUFFER_SIZE: usize = 1024 * 1024;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;

// ============================================================================
// Listener Defaults
// ============================================================================

/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;
