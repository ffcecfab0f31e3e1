//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `tcprelay_core::defaults`.

use tcprelay_core::defaults;

/// Generate default value functions that forward to tcprelay_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

default_fns! {
    default_connect_timeout_secs  => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_io_timeout_secs       => DEFAULT_IO_TIMEOUT_SECS: u64,
    default_shutdown_timeout_secs => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
    default_relay_buffer_size     => DEFAULT_RELAY_BUFFER_SIZE: usize,
    min_relay_buffer_size         => MIN_RELAY_BUFFER_SIZE: usize,
    max_relay_buffer_size         => MAX_RELAY_BUFFER_SIZE: usize,
    default_connection_backlog    => DEFAULT_CONNECTION_BACKLOG: u32,
    // TCP socket options
    default_tcp_no_delay          => DEFAULT_TCP_NO_DELAY: bool,
}
