use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match scenebridged::run_bridge() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr().lock(), "scenebridged: {error}");
            ExitCode::FAILURE
        }
    }
}
