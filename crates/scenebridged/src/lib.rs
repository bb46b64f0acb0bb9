//! SceneBridge daemon.
//!
//! The bridge exposes a registry of scene-editing commands to remote clients
//! over a persistent TCP connection speaking newline-insensitive JSON. Each
//! connection runs on its own thread; commands that touch scene state are
//! funnelled through a single-writer [`JobQueue`] so at most one mutates the
//! scene at a time, in arrival order.
//!
//! The crate is usable two ways:
//!
//! - as the `scenebridged` binary, serving a reference in-memory scene until a
//!   termination signal arrives;
//! - as a library, where a host application supplies its own
//!   [`CommandRegistry`], builds a [`Bridge`], and optionally drives
//!   [`JobQueue::drain_one`] from its own main loop via
//!   [`Bridge::with_external_drain`].
//!
//! Reserved commands (`help`, `protocol_version`, the chunked upload trio,
//! `get_job_status`, `list_tools` and `call_tool`) are answered by the bridge
//! itself and never reach the registry.

mod bootstrap;
pub mod dispatch;
mod health;
pub mod jobs;
mod periodic;
mod process;
pub mod registry;
pub mod scene;
mod server;
mod telemetry;
pub mod transport;
pub mod uploads;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use dispatch::{DispatchError, Dispatcher, ExecutionSettings};
pub use health::{HealthReporter, LifecycleEvent, StructuredHealthReporter};
pub use jobs::{DrainOutcome, JobId, JobQueue, JobSnapshot, JobStatus};
pub use periodic::{PeriodicError, PeriodicHandle};
pub use process::{
    LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal,
    run_bridge, run_bridge_with,
};
pub use registry::{
    ArgSpec, CommandHandler, CommandRegistry, HandlerError, HandlerResult, RegistryError,
    ToolDescriptor,
};
pub use server::{Bridge, BridgeError, RunningBridge, ServeError};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use uploads::{UploadError, UploadManager, UploadSink};

#[cfg(test)]
mod tests;
