//! Unified error surface for running the bridge process.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::registry::RegistryError;
use crate::server::ServeError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the bridge.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The command registry could not be assembled.
    #[error("invalid command registry: {0}")]
    Registry(#[from] RegistryError),
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Serving failed; includes bind failures.
    #[error("bridge failed to serve: {0}")]
    Serve(#[from] ServeError),
    /// Waiting for the shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}
