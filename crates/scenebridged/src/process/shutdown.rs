//! Waiting for the request to stop.

use std::fmt;
use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;

/// Signals that stop the daemon.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// What released [`ShutdownSignal::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// A POSIX signal arrived.
    Signal(i32),
    /// The embedding code asked for a stop.
    Requested,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => write!(f, "signal {signal}"),
            Self::Requested => f.write_str("stop request"),
        }
    }
}

/// Blocks the process runner until the bridge should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Waits for a stop trigger.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the trigger source cannot be set up.
    fn wait(&self) -> Result<ShutdownTrigger, ShutdownError>;
}

/// Errors raised while waiting for shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Signal handlers could not be registered.
    #[error("failed to register termination signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Waits for one of [`TERMINATION_SIGNALS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<ShutdownTrigger, ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        Ok(signals
            .forever()
            .next()
            .map_or(ShutdownTrigger::Requested, ShutdownTrigger::Signal))
    }
}
