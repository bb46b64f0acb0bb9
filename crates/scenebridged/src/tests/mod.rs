//! Test suites for the bridge daemon.

mod bridge_behaviour;
mod process_behaviour;
mod support;
