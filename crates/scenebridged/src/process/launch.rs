//! Launch sequencing for the bridge process.

use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{Bootstrapped, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, LifecycleEvent, StructuredHealthReporter};
use crate::registry::CommandRegistry;
use crate::scene::{SceneStore, reference_registry};

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;

/// Collaborators needed to run the bridge.
pub struct LaunchPlan<L, S> {
    /// Configuration source.
    pub loader: L,
    /// Lifecycle observer.
    pub reporter: Arc<dyn HealthReporter>,
    /// Blocks until the bridge should stop.
    pub shutdown: S,
    /// Commands exposed to clients.
    pub registry: CommandRegistry,
}

/// Runs the bridge with the reference in-memory scene until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, binding or signal installation
/// fails.
pub fn run_bridge() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal,
        registry: reference_registry(Arc::new(SceneStore::new()))?,
    };
    run_bridge_with(plan)
}

/// Runs the bridge with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, binding or signal installation
/// fails.
pub fn run_bridge_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
        registry,
    } = plan;
    let Bootstrapped { bridge, .. } = bootstrap_with(&loader, reporter.as_ref(), registry)?;
    let running = bridge.serve()?;
    reporter.report(LifecycleEvent::ListenerReady(running.local_addr()));

    // Stop the bridge even when the wait itself failed.
    let waited = shutdown.wait();
    reporter.report(LifecycleEvent::ShutdownStarted);
    running.stop()?;
    let trigger = waited?;
    reporter.report(LifecycleEvent::ShutdownCompleted);
    info!(target: PROCESS_TARGET, %trigger, "shutdown sequence completed");
    Ok(())
}
