//! Error type constants for logging.
//!
//! These constants provide consistent error classification across all crates.

/// Outbound dial failed.
pub const ERROR_CONNECT: &str = "connect";
/// Outbound dial exceeded the connect timeout.
pub const ERROR_CONNECT_TIMEOUT: &str = "connect_timeout";
/// A read exceeded the idle timeout.
pub const ERROR_READ_TIMEOUT: &str = "read_timeout";
/// A read failed.
pub const ERROR_READ: &str = "read";
/// A write exceeded the idle timeout.
pub const ERROR_WRITE_TIMEOUT: &str = "write_timeout";
/// A write failed.
pub const ERROR_WRITE: &str = "write";
/// A forwarder task ended without reporting.
pub const ERROR_ABORTED: &str = "aborted";
/// Relay options or configuration were rejected.
pub const ERROR_CONFIG: &str = "config";
/// Listener-side I/O error.
pub const ERROR_IO: &str = "io";
