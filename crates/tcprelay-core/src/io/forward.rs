//! One-directional copy loop with per-operation idle deadlines.
//!
//! A forwarder reads from its source leg and writes to its sink leg until
//! either side ends. Every read and every write gets a fresh deadline of
//! `now + io_timeout`, so the timeout bounds idleness, not session length.
//! Timeouts too large to represent as an instant never fire.
//!
//! Each leg has a close signal shared by both forwarders. A forwarder that
//! stops closes the leg it stopped on; the peer forwarder, blocked on that
//! same leg as its source or sink, observes the signal and stops too.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Direction, Leg, RelayError};
use crate::io::relay::RelayMetrics;

/// Terminal outcome of one forwarder.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The source leg reached a clean end of stream.
    GracefulEnd,
    Failed(RelayError),
}

/// What a forwarder publishes on the shared outcome channel, exactly once.
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) direction: Direction,
    pub(crate) outcome: Outcome,
}

/// Close signal for one leg.
#[derive(Debug, Clone)]
pub(crate) struct LegSignal {
    leg: Leg,
    closed: CancellationToken,
}

impl LegSignal {
    pub(crate) fn new(leg: Leg) -> Self {
        Self {
            leg,
            closed: CancellationToken::new(),
        }
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

fn leg_closed(leg: Leg) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, format!("{leg} leg closed"))
}

pub(crate) struct Forwarder<R, W> {
    direction: Direction,
    source: R,
    sink: W,
    source_leg: LegSignal,
    sink_leg: LegSignal,
    io_timeout: Duration,
    buffer_size: usize,
    reports: mpsc::Sender<Report>,
    metrics: Arc<dyn RelayMetrics>,
}

impl<R, W> Forwarder<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        direction: Direction,
        source: R,
        sink: W,
        source_leg: LegSignal,
        sink_leg: LegSignal,
        io_timeout: Duration,
        buffer_size: usize,
        reports: mpsc::Sender<Report>,
        metrics: Arc<dyn RelayMetrics>,
    ) -> Self {
        debug_assert_eq!(source_leg.leg, direction.source());
        debug_assert_eq!(sink_leg.leg, direction.sink());
        Self {
            direction,
            source,
            sink,
            source_leg,
            sink_leg,
            io_timeout,
            buffer_size,
            reports,
            metrics,
        }
    }

    /// Copy until the source ends or either leg fails, report once, then
    /// close the leg the loop stopped on. Returns the bytes forwarded.
    ///
    /// The source and sink halves are dropped when this returns.
    pub(crate) async fn run(mut self) -> u64 {
        // Unwinding out of the loop closes both legs so the peer is released.
        let source_guard = self.source_leg.closed.clone().drop_guard();
        let sink_guard = self.sink_leg.closed.clone().drop_guard();

        let mut buf = vec![0u8; self.buffer_size];
        let mut forwarded = 0u64;

        let (outcome, stopped_on) = loop {
            let n = match self.read(&mut buf).await {
                Ok(0) => break (Outcome::GracefulEnd, self.direction.source()),
                Ok(n) => n,
                Err(e) => {
                    let leg = e.leg().unwrap_or(self.direction.source());
                    break (Outcome::Failed(e), leg);
                }
            };
            if let Err(e) = self.write(&buf[..n]).await {
                let leg = e.leg().unwrap_or(self.direction.sink());
                break (Outcome::Failed(e), leg);
            }
            forwarded += n as u64;
            self.record(n as u64);
        };

        source_guard.disarm();
        sink_guard.disarm();

        // The channel holds one slot per forwarder, so this never waits. The
        // report goes out before the close so the cause always arrives first.
        let _ = self
            .reports
            .send(Report {
                direction: self.direction,
                outcome,
            })
            .await;

        if stopped_on == self.source_leg.leg {
            self.source_leg.close();
        } else {
            self.sink_leg.close();
        }
        forwarded
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        let direction = self.direction;
        let leg = direction.source();

        tokio::select! {
            biased;
            _ = self.source_leg.closed.cancelled() => Err(RelayError::ReadFailure {
                leg,
                direction,
                source: leg_closed(leg),
            }),
            _ = self.sink_leg.closed.cancelled() => Err(RelayError::WriteFailure {
                leg: direction.sink(),
                direction,
                source: leg_closed(direction.sink()),
            }),
            res = timeout(self.io_timeout, self.source.read(buf)) => match res {
                Ok(Ok(n)) => Ok(n),
                Ok(Err(source)) => Err(RelayError::ReadFailure { leg, direction, source }),
                Err(_) => Err(RelayError::ReadTimeout {
                    leg,
                    direction,
                    timeout: self.io_timeout,
                }),
            },
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), RelayError> {
        let direction = self.direction;
        let leg = direction.sink();
        let sink = &mut self.sink;
        let write = async {
            sink.write_all(data).await?;
            sink.flush().await
        };

        tokio::select! {
            biased;
            _ = self.sink_leg.closed.cancelled() => Err(RelayError::WriteFailure {
                leg,
                direction,
                source: leg_closed(leg),
            }),
            res = timeout(self.io_timeout, write) => match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(RelayError::WriteFailure { leg, direction, source }),
                Err(_) => Err(RelayError::WriteTimeout {
                    leg,
                    direction,
                    timeout: self.io_timeout,
                }),
            },
        }
    }

    #[inline]
    fn record(&self, bytes: u64) {
        match self.direction {
            Direction::Upstream => self.metrics.record_upstream(bytes),
            Direction::Downstream => self.metrics.record_downstream(bytes),
        }
    }
}
