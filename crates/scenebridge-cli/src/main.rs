//! CLI entrypoint for the scene bridge client.
//!
//! Delegates to [`scenebridge_cli::run`], which parses arguments, connects
//! to the bridge and prints each response as a JSON line.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    scenebridge_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
