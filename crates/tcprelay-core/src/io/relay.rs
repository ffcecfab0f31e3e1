//! Bidirectional relay coordinator.
//!
//! The two directions run as independent tasks. Each publishes exactly one
//! report on a shared two-slot channel. The coordinator takes the first
//! report as the relay's outcome, then drains the second and joins both
//! tasks before returning, so nothing outlives the call and nothing is
//! reported twice.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Direction, Leg, RelayError};
use crate::io::dial::dial;
use crate::io::forward::{Forwarder, LegSignal, Outcome, Report};
use crate::options::RelayOptions;

/// Trait for recording relay metrics.
///
/// Called once per successful write with the number of bytes forwarded.
pub trait RelayMetrics: Send + Sync {
    /// Record bytes forwarded from the inbound leg to the outbound leg.
    fn record_upstream(&self, bytes: u64);
    /// Record bytes forwarded from the outbound leg to the inbound leg.
    fn record_downstream(&self, bytes: u64);
}

/// No-op metrics implementation for cases where metrics aren't needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl RelayMetrics for NoOpMetrics {
    #[inline]
    fn record_upstream(&self, _bytes: u64) {}
    #[inline]
    fn record_downstream(&self, _bytes: u64) {}
}

/// Bytes forwarded in each direction over one relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub upstream_bytes: u64,
    pub downstream_bytes: u64,
}

/// A configured relay.
///
/// One `Relay` can serve any number of inbound connections; every call runs
/// an independent relay with no state shared between calls.
#[derive(Clone)]
pub struct Relay {
    options: RelayOptions,
    metrics: Arc<dyn RelayMetrics>,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Create a relay after validating its options.
    pub fn new(options: RelayOptions) -> Result<Self, RelayError> {
        options.validate()?;
        Ok(Self {
            options,
            metrics: Arc::new(NoOpMetrics),
        })
    }

    /// Record forwarded bytes to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn RelayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Open the outbound leg.
    pub async fn dial(&self) -> Result<TcpStream, RelayError> {
        dial(&self.options).await
    }

    /// Dial the remote address, then forward until the relay ends.
    ///
    /// The inbound stream is consumed: if the dial fails it is dropped
    /// untouched. Callers that need it back on a failed dial use
    /// [`Relay::dial`] followed by [`Relay::forward`].
    pub async fn proxy(&self, inbound: TcpStream) -> Result<(), RelayError> {
        let outbound = self.dial().await?;
        self.forward(inbound, outbound).await
    }

    /// Forward between two established connections until the relay ends.
    ///
    /// Returns `Ok(())` when the first direction to finish did so because
    /// its source cleanly closed, otherwise the first direction's error.
    /// Both connections are closed when this returns.
    pub async fn forward(&self, inbound: TcpStream, outbound: TcpStream) -> Result<(), RelayError> {
        self.forward_with_stats(inbound, outbound).await.1
    }

    /// Like [`Relay::forward`], also returning per-direction byte counts.
    pub async fn forward_with_stats(
        &self,
        inbound: TcpStream,
        outbound: TcpStream,
    ) -> (RelayStats, Result<(), RelayError>) {
        let (in_r, in_w) = inbound.into_split();
        let (out_r, out_w) = outbound.into_split();
        self.forward_halves(in_r, in_w, out_r, out_w).await
    }

    async fn forward_halves<IR, IW, OR, OW>(
        &self,
        in_r: IR,
        in_w: IW,
        out_r: OR,
        out_w: OW,
    ) -> (RelayStats, Result<(), RelayError>)
    where
        IR: AsyncRead + Unpin + Send + 'static,
        IW: AsyncWrite + Unpin + Send + 'static,
        OR: AsyncRead + Unpin + Send + 'static,
        OW: AsyncWrite + Unpin + Send + 'static,
    {
        let inbound = LegSignal::new(Leg::Inbound);
        let outbound = LegSignal::new(Leg::Outbound);
        let (tx, mut rx) = mpsc::channel::<Report>(2);

        let upstream = tokio::spawn(
            Forwarder::new(
                Direction::Upstream,
                in_r,
                out_w,
                inbound.clone(),
                outbound.clone(),
                self.options.io_timeout,
                self.options.buffer_size,
                tx.clone(),
                self.metrics.clone(),
            )
            .run(),
        );
        let downstream = tokio::spawn(
            Forwarder::new(
                Direction::Downstream,
                out_r,
                in_w,
                outbound,
                inbound,
                self.options.io_timeout,
                self.options.buffer_size,
                tx,
                self.metrics.clone(),
            )
            .run(),
        );

        // Senders live only in the forwarders, so a missing report shows up
        // as a closed channel instead of a hang.
        let first = rx.recv().await;
        let second = rx.recv().await;

        let stats = RelayStats {
            upstream_bytes: join_forwarder(upstream, Direction::Upstream).await,
            downstream_bytes: join_forwarder(downstream, Direction::Downstream).await,
        };

        let result = settle(first, second);
        match &result {
            Ok(()) => debug!(
                upstream_bytes = stats.upstream_bytes,
                downstream_bytes = stats.downstream_bytes,
                "relay finished"
            ),
            Err(e) => debug!(
                upstream_bytes = stats.upstream_bytes,
                downstream_bytes = stats.downstream_bytes,
                error = %e,
                "relay failed"
            ),
        }
        (stats, result)
    }
}

async fn join_forwarder(handle: JoinHandle<u64>, direction: Direction) -> u64 {
    match handle.await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(direction = %direction, error = %e, "forwarder task failed");
            0
        }
    }
}

/// Reduce the two reports of a relay to its single outcome.
///
/// The first report decides. The second is only logged; its detail is not
/// surfaced to the caller. With no report at all there is no direction to
/// blame, so the abort carries none.
fn settle(first: Option<Report>, second: Option<Report>) -> Result<(), RelayError> {
    let Some(first) = first else {
        return Err(RelayError::ForwarderAborted(None));
    };

    match &second {
        Some(drained) => match &drained.outcome {
            Outcome::GracefulEnd => {
                debug!(direction = %drained.direction, "drained graceful end")
            }
            Outcome::Failed(e) => {
                debug!(direction = %drained.direction, error = %e, "drained forwarder error")
            }
        },
        None => warn!(
            direction = %other(first.direction),
            "forwarder ended without reporting"
        ),
    }

    match first.outcome {
        Outcome::Failed(e) => Err(e),
        Outcome::GracefulEnd if second.is_none() => {
            Err(RelayError::ForwarderAborted(Some(other(first.direction))))
        }
        Outcome::GracefulEnd => Ok(()),
    }
}

fn other(direction: Direction) -> Direction {
    match direction {
        Direction::Upstream => Direction::Downstream,
        Direction::Downstream => Direction::Upstream,
    }
}
