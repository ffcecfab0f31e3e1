//! tcprelay server library.
//!
//! Accepts inbound TCP connections and relays each one to a fixed remote
//! address. Exposed as a library for integration tests and embedding.

pub mod cli;
mod error;
mod server;
mod util;

pub use cli::ServerArgs;
pub use error::ServerError;
pub use server::{TrafficCounters, run, run_with_shutdown};
pub use tokio_util::sync::CancellationToken;
pub use util::{ConnectionGuard, ConnectionTracker, create_listener};
