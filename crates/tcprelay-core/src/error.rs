//! Relay error type and the leg/direction labels it carries.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::errors::{
    ERROR_ABORTED, ERROR_CONFIG, ERROR_CONNECT, ERROR_CONNECT_TIMEOUT, ERROR_READ,
    ERROR_READ_TIMEOUT, ERROR_WRITE, ERROR_WRITE_TIMEOUT,
};

/// One of the two TCP connections taking part in a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    /// The already-accepted connection handed to the relay.
    Inbound,
    /// The connection the relay dialed to the remote address.
    Outbound,
}

impl Leg {
    pub fn as_str(self) -> &'static str {
        match self {
            Leg::Inbound => "inbound",
            Leg::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two copy flows of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Inbound leg to outbound leg.
    Upstream,
    /// Outbound leg to inbound leg.
    Downstream,
}

impl Direction {
    /// Leg this direction reads from.
    pub fn source(self) -> Leg {
        match self {
            Direction::Upstream => Leg::Inbound,
            Direction::Downstream => Leg::Outbound,
        }
    }

    /// Leg this direction writes to.
    pub fn sink(self) -> Leg {
        match self {
            Direction::Upstream => Leg::Outbound,
            Direction::Downstream => Leg::Inbound,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a relay.
///
/// A relay that ends because either peer cleanly closed its stream is not an
/// error; it returns `Ok(())`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },
    #[error("{direction}: read from {leg} leg timed out after {timeout:?}")]
    ReadTimeout {
        leg: Leg,
        direction: Direction,
        timeout: Duration,
    },
    #[error("{direction}: read from {leg} leg failed: {source}")]
    ReadFailure {
        leg: Leg,
        direction: Direction,
        #[source]
        source: io::Error,
    },
    #[error("{direction}: write to {leg} leg timed out after {timeout:?}")]
    WriteTimeout {
        leg: Leg,
        direction: Direction,
        timeout: Duration,
    },
    #[error("{direction}: write to {leg} leg failed: {source}")]
    WriteFailure {
        leg: Leg,
        direction: Direction,
        #[source]
        source: io::Error,
    },
    /// A forwarder task ended without reporting. `None` when neither did.
    #[error("{} ended without reporting", aborted_label(.0))]
    ForwarderAborted(Option<Direction>),
    #[error("invalid relay options: {0}")]
    InvalidOptions(String),
}

fn aborted_label(direction: &Option<Direction>) -> &'static str {
    match direction {
        Some(Direction::Upstream) => "upstream forwarder",
        Some(Direction::Downstream) => "downstream forwarder",
        None => "both forwarders",
    }
}

impl RelayError {
    /// Get the error type string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Connect { .. } => ERROR_CONNECT,
            RelayError::ConnectTimeout { .. } => ERROR_CONNECT_TIMEOUT,
            RelayError::ReadTimeout { .. } => ERROR_READ_TIMEOUT,
            RelayError::ReadFailure { .. } => ERROR_READ,
            RelayError::WriteTimeout { .. } => ERROR_WRITE_TIMEOUT,
            RelayError::WriteFailure { .. } => ERROR_WRITE,
            RelayError::ForwarderAborted(_) => ERROR_ABORTED,
            RelayError::InvalidOptions(_) => ERROR_CONFIG,
        }
    }

    /// True for connect, read and write timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RelayError::ConnectTimeout { .. }
                | RelayError::ReadTimeout { .. }
                | RelayError::WriteTimeout { .. }
        )
    }

    /// True if the relay never started forwarding because the dial failed.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            RelayError::Connect { .. } | RelayError::ConnectTimeout { .. }
        )
    }

    /// Leg the failing operation ran on, if it was a forwarding operation.
    pub fn leg(&self) -> Option<Leg> {
        match self {
            RelayError::ReadTimeout { leg, .. }
            | RelayError::ReadFailure { leg, .. }
            | RelayError::WriteTimeout { leg, .. }
            | RelayError::WriteFailure { leg, .. } => Some(*leg),
            RelayError::Connect { .. } | RelayError::ConnectTimeout { .. } => Some(Leg::Outbound),
            RelayError::ForwarderAborted(_) | RelayError::InvalidOptions(_) => None,
        }
    }

    /// Direction whose forwarder reported the failure.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            RelayError::ReadTimeout { direction, .. }
            | RelayError::ReadFailure { direction, .. }
            | RelayError::WriteTimeout { direction, .. }
            | RelayError::WriteFailure { direction, .. } => Some(*direction),
            RelayError::ForwarderAborted(direction) => *direction,
            _ => None,
        }
    }
}
