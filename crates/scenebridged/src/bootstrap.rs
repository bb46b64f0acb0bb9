//! Bridge bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use scenebridge_config::Config;

use crate::health::{HealthReporter, LifecycleEvent};
use crate::registry::CommandRegistry;
use crate::server::{Bridge, BridgeError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the bridge configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no valid configuration is available.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The bridge could not be wired from the configuration.
    #[error("failed to assemble bridge: {source}")]
    Bridge {
        /// Underlying assembly error.
        #[source]
        source: BridgeError,
    },
}

/// Result of a successful bootstrap.
pub struct Bootstrapped {
    /// Wired bridge, not yet serving.
    pub bridge: Bridge,
    /// Telemetry handle.
    pub telemetry: TelemetryHandle,
}

/// Loads configuration, installs telemetry and wires the bridge.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first failing stage; the reporter sees
/// the failure before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    registry: CommandRegistry,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.report(LifecycleEvent::BootstrapStarting);
    let result = assemble(loader, registry);
    reporter.report(match &result {
        Ok(bootstrapped) => LifecycleEvent::BootstrapSucceeded(bootstrapped.bridge.config()),
        Err(error) => LifecycleEvent::BootstrapFailed(error),
    });
    result
}

fn assemble(
    loader: &dyn ConfigLoader,
    registry: CommandRegistry,
) -> Result<Bootstrapped, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let bridge =
        Bridge::new(config, registry).map_err(|source| BootstrapError::Bridge { source })?;
    Ok(Bootstrapped { bridge, telemetry })
}
