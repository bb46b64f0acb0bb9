//! Process lifecycle: startup, blocking on termination signals, shutdown.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{LaunchPlan, run_bridge, run_bridge_with};
pub use shutdown::{
    ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal, TERMINATION_SIGNALS,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
