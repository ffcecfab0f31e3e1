//! Bidirectional TCP relay core.
//!
//! This crate provides:
//! - The relay primitive: dial the outbound leg, forward both directions
//!   concurrently with per-operation idle deadlines, and report exactly one
//!   outcome per relay
//! - Default configuration values
//! - Error type constants for logging

pub mod defaults;
pub mod error;
pub mod errors;
pub mod io;
pub mod options;

// Re-export commonly used items at crate root
pub use defaults::*;
pub use error::{Direction, Leg, RelayError};
pub use errors::*;
pub use io::{NoOpMetrics, Relay, RelayMetrics, RelayStats};
pub use options::RelayOptions;

/// Project name.
pub const PROJECT_NAME: &str = "tcprelay";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
