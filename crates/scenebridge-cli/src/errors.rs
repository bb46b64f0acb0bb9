//! Error types for the client and CLI runtime.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use scenebridge_protocol::FrameError;
use thiserror::Error;

/// Failures talking to the bridge.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The host name did not resolve.
    #[error("failed to resolve bridge address {endpoint}: {source}")]
    Resolve {
        /// `host:port` that was looked up.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Every connection attempt failed.
    #[error("failed to connect to bridge at {endpoint} after {attempts} attempts: {source}")]
    Connect {
        /// `host:port` that was dialled.
        endpoint: String,
        /// Attempts made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: io::Error,
    },
    /// The command could not be serialised.
    #[error("failed to serialise command: {0}")]
    Serialise(#[source] serde_json::Error),
    /// Writing the command failed.
    #[error("failed to send command to bridge: {0}")]
    Send(#[source] io::Error),
    /// Reading the response failed.
    #[error("failed to read response from bridge: {0}")]
    Read(#[source] io::Error),
    /// No complete response arrived in time.
    #[error("no response from bridge within {}s", timeout.as_secs())]
    Timeout {
        /// Response deadline that lapsed.
        timeout: Duration,
    },
    /// The bridge closed the connection before answering.
    #[error("bridge closed the connection before responding")]
    Closed,
    /// The bridge sent bytes that are not JSON.
    #[error("bridge sent malformed data: {0}")]
    Malformed(#[source] FrameError),
    /// The bridge sent JSON that is not a response envelope.
    #[error("bridge sent an unexpected response: {0}")]
    Unexpected(#[source] serde_json::Error),
    /// A multi-step exchange was refused part way through.
    #[error("{command} failed: {message}")]
    Rejected {
        /// Step that failed.
        command: String,
        /// Message reported by the bridge.
        message: String,
    },
}

impl ClientError {
    /// Returns true when retrying on a fresh connection may succeed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Send(_) | Self::Read(_) | Self::Timeout { .. } | Self::Closed
        )
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("params must be a JSON object: {0}")]
    InvalidParams(String),
    #[error("failed to read {}: {source}", path.display())]
    ReadFile { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
}
