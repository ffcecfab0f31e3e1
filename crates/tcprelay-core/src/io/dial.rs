//! Outbound dialer.

use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::options::RelayOptions;

/// Open the outbound leg, waiting at most `connect_timeout`.
///
/// Name resolution is part of the bounded wait. The underlying cause of a
/// failed attempt is kept as the error source.
pub async fn dial(options: &RelayOptions) -> Result<TcpStream, RelayError> {
    let addr = options.remote_addr.as_str();
    debug!(remote = %addr, timeout = ?options.connect_timeout, "dialing outbound");

    let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| RelayError::ConnectTimeout {
            addr: addr.to_string(),
            timeout: options.connect_timeout,
        })?
        .map_err(|source| RelayError::Connect {
            addr: addr.to_string(),
            source,
        })?;

    if options.no_delay
        && let Err(e) = stream.set_nodelay(true)
    {
        warn!(remote = %addr, error = %e, "failed to set TCP_NODELAY on outbound");
    }

    debug!(remote = %addr, "outbound connected");
    Ok(stream)
}
