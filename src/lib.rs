//! # tcprelay
//!
//! Bidirectional TCP relay: every accepted connection is forwarded to a fixed
//! remote address, with an idle timeout applied to each read and write.
//!
//! ## Crates
//!
//! - [`tcprelay_core`] - The relay primitive, error types and defaults
//! - [`tcprelay_config`] - Configuration loading and validation
//! - [`tcprelay_server`] - Listener, accept loop and CLI

pub use tcprelay_config as config;
pub use tcprelay_core as core;
pub use tcprelay_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tcprelay_config::{Config, load_config, validate_config};
    pub use tcprelay_core::{Relay, RelayError, RelayOptions};
    pub use tcprelay_server::{CancellationToken, ServerError, run, run_with_shutdown};
}
