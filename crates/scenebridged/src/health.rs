//! Lifecycle reporting.
//!
//! Bootstrap and the process runner describe what they are doing as
//! [`LifecycleEvent`]s. The production [`StructuredHealthReporter`] turns
//! each one into a `tracing` event under the `health` target with a stable
//! `event` field, so log pipelines can follow startup and shutdown without
//! parsing messages.

use std::net::SocketAddr;
use std::sync::Arc;

use scenebridge_config::Config;
use tracing::{error, info};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// A step in the bridge's life.
#[derive(Debug, Clone, Copy)]
pub enum LifecycleEvent<'a> {
    /// Configuration is about to load.
    BootstrapStarting,
    /// Configuration loaded and the bridge is wired.
    BootstrapSucceeded(&'a Config),
    /// Bootstrap stopped at the given error.
    BootstrapFailed(&'a BootstrapError),
    /// The listener is bound and accepting.
    ListenerReady(SocketAddr),
    /// A stop was requested.
    ShutdownStarted,
    /// Every bridge thread has exited.
    ShutdownCompleted,
}

impl LifecycleEvent<'_> {
    /// Stable identifier written to the `event` field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BootstrapStarting => "bootstrap_starting",
            Self::BootstrapSucceeded(_) => "bootstrap_succeeded",
            Self::BootstrapFailed(_) => "bootstrap_failed",
            Self::ListenerReady(_) => "listener_ready",
            Self::ShutdownStarted => "shutdown_started",
            Self::ShutdownCompleted => "shutdown_completed",
        }
    }
}

/// Receives lifecycle events.
pub trait HealthReporter: Send + Sync {
    /// Records one event. Must not block.
    fn report(&self, event: LifecycleEvent<'_>);
}

impl<T: HealthReporter + ?Sized> HealthReporter for Arc<T> {
    fn report(&self, event: LifecycleEvent<'_>) {
        (**self).report(event);
    }
}

/// Reporter writing lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn report(&self, event: LifecycleEvent<'_>) {
        let name = event.name();
        match event {
            LifecycleEvent::BootstrapStarting => {
                info!(target: HEALTH_TARGET, event = name, "loading bridge configuration");
            }
            LifecycleEvent::BootstrapSucceeded(config) => {
                let (host, port) = config.listen_address();
                info!(
                    target: HEALTH_TARGET,
                    event = name,
                    host,
                    port,
                    dispatch_mode = %config.dispatch_mode,
                    max_connections = config.max_connections,
                    job_timeout_secs = config.job_timeout_secs,
                    uploads_to = ?config.upload_dir(),
                    "bridge configured"
                );
            }
            LifecycleEvent::BootstrapFailed(failure) => {
                error!(target: HEALTH_TARGET, event = name, error = %failure, "bridge bootstrap failed");
            }
            LifecycleEvent::ListenerReady(address) => {
                info!(target: HEALTH_TARGET, event = name, %address, "bridge accepting connections");
            }
            LifecycleEvent::ShutdownStarted => {
                info!(target: HEALTH_TARGET, event = name, "stopping bridge");
            }
            LifecycleEvent::ShutdownCompleted => {
                info!(target: HEALTH_TARGET, event = name, "bridge stopped");
            }
        }
    }
}
