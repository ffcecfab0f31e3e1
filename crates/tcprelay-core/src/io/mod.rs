//! Relay I/O: the outbound dialer, the per-direction forwarder and the
//! coordinator joining both directions into one outcome.

mod dial;
mod forward;
mod relay;

pub use dial::dial;
pub use relay::{NoOpMetrics, Relay, RelayMetrics, RelayStats};
