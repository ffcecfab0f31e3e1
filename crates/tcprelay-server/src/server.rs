//! Main server loop and connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tcprelay_config::Config;
use tcprelay_core::{Relay, RelayMetrics};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::ServerError;
use crate::util::{ConnectionTracker, create_listener};

/// Byte totals across every relay served by one server run.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    upstream: AtomicU64,
    downstream: AtomicU64,
}

impl TrafficCounters {
    pub fn upstream_bytes(&self) -> u64 {
        self.upstream.load(Ordering::Relaxed)
    }

    pub fn downstream_bytes(&self) -> u64 {
        self.downstream.load(Ordering::Relaxed)
    }
}

impl RelayMetrics for TrafficCounters {
    fn record_upstream(&self, bytes: u64) {
        self.upstream.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_downstream(&self, bytes: u64) {
        self.downstream.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Run the server with a cancellation token for graceful shutdown.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Config("invalid listen address".into()))?;

    let counters = Arc::new(TrafficCounters::default());
    let relay = Relay::new(config.relay_options())?.with_metrics(counters.clone());
    let tracker = ConnectionTracker::new();

    // Connection limiter (None = unlimited)
    let conn_limit: Option<Arc<Semaphore>> = config.server.max_connections.map(|n| {
        info!("max_connections set to {}", n);
        Arc::new(Semaphore::new(n))
    });

    let listener = create_listener(listen, config.server.connection_backlog)?;
    info!(
        address = %listen,
        remote = %config.server.remote,
        backlog = config.server.connection_backlog,
        io_timeout_secs = config.server.io_timeout_secs,
        "listening"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept() => {
                let (tcp, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        // Transient accept errors (EMFILE, ECONNABORTED) do not stop the server.
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };

                let permit: Option<OwnedSemaphorePermit> = match &conn_limit {
                    Some(sem) => match sem.clone().try_acquire_owned() {
                        Ok(p) => Some(p),
                        Err(_) => {
                            debug!(peer = %peer, reason = "max_connections", "connection rejected");
                            drop(tcp); // close immediately
                            continue;
                        }
                    },
                    None => None,
                };

                debug!(peer = %peer, "new connection");

                let relay = relay.clone();
                let guard = tracker.track();
                let span = info_span!("relay", peer = %peer);

                tokio::spawn(
                    async move {
                        let _guard = guard;
                        let _permit = permit; // hold permit until the relay ends
                        let start = Instant::now();

                        let result = handle_conn(&relay, tcp).await;

                        let duration_secs = start.elapsed().as_secs_f64();
                        match result {
                            Ok(()) => debug!(duration_secs, "connection closed"),
                            Err(err) => warn!(
                                duration_secs,
                                error_type = err.error_type(),
                                error = %err,
                                "connection closed with error"
                            ),
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }

    // Stop listening before draining.
    drop(listener);

    let active = tracker.count();
    if active > 0 {
        info!("waiting for {} active connections to drain", active);
        let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
        if tracker.wait_for_zero(grace).await {
            info!("all connections drained");
        } else {
            warn!(
                "shutdown timeout, {} connections still active",
                tracker.count()
            );
        }
    }

    info!(
        upstream_bytes = counters.upstream_bytes(),
        downstream_bytes = counters.downstream_bytes(),
        "server stopped"
    );
    Ok(())
}

/// Run the server until the process exits (no graceful shutdown).
pub async fn run(config: Config) -> Result<(), ServerError> {
    run_with_shutdown(config, CancellationToken::new()).await
}

/// Relay one accepted connection to the configured remote.
async fn handle_conn(relay: &Relay, inbound: TcpStream) -> Result<(), ServerError> {
    if relay.options().no_delay
        && let Err(e) = inbound.set_nodelay(true)
    {
        warn!(error = %e, "failed to set TCP_NODELAY on inbound connection");
    }

    let outbound = relay.dial().await?;
    relay.forward(inbound, outbound).await?;
    Ok(())
}
