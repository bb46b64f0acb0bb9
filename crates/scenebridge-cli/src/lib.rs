//! Client for the scene bridge protocol.
//!
//! [`BridgeClient`] is a blocking client with reconnect backoff, usable as a
//! library by relays and scripts. [`run`] drives the `scenebridge` binary:
//! it sends one command (or one chunked upload) and writes the response to
//! stdout as a single JSON line.
//!
//! Exit codes: `0` for an `ok` response, `1` for an `error` response, `2`
//! when the bridge could not be reached or the arguments were invalid.

mod cli;
mod client;
mod errors;

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;
use scenebridge_protocol::{Params, Response};
use serde_json::{Value, json};

pub use client::{
    Backoff, BridgeClient, CONNECT_TIMEOUT, ClientOptions, DEFAULT_CHUNK_BYTES,
    DEFAULT_CONNECT_ATTEMPTS, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_RETRY_DELAY, UploadReceipt,
};
pub use errors::ClientError;

use cli::{Cli, CliCommand};
use errors::AppError;

const EXIT_REJECTED: u8 = 1;
const EXIT_UNREACHABLE: u8 = 2;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    match execute(cli, stdout) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_REJECTED),
        Err(error) => report(stderr, &error),
    }
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let _ = writeln!(stderr, "scenebridge: {error}");
    ExitCode::from(EXIT_UNREACHABLE)
}

/// Returns whether the bridge answered `ok`.
fn execute<W: Write>(cli: Cli, stdout: &mut W) -> Result<bool, AppError> {
    let mut client = BridgeClient::new(ClientOptions {
        host: cli.host,
        port: cli.port,
        attempts: cli.retries,
        backoff: Backoff::new(Duration::from_millis(cli.retry_delay_ms)),
        response_timeout: Duration::from_secs(cli.timeout_secs),
    });

    match cli.command {
        CliCommand::Send { kind, params } => {
            let params = parse_params(params.as_deref())?;
            let response = client.request(&kind, params)?;
            emit(stdout, &response)?;
            Ok(response.is_ok())
        }
        CliCommand::Upload { file, chunk_bytes } => {
            let payload = fs::read(&file).map_err(|source| AppError::ReadFile {
                path: file.clone(),
                source,
            })?;
            match client.upload(&payload, chunk_bytes) {
                Ok(receipt) => {
                    let summary = json!({ "upload_id": receipt.upload_id, "size": receipt.size });
                    emit(stdout, &Response::ok(summary))?;
                    Ok(true)
                }
                Err(ClientError::Rejected { command, message }) => {
                    emit(stdout, &Response::error(format!("{command} failed: {message}")))?;
                    Ok(false)
                }
                Err(error) => Err(error.into()),
            }
        }
    }
}

fn parse_params(raw: Option<&str>) -> Result<Params, AppError> {
    let Some(raw) = raw else {
        return Ok(Params::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(other) => Err(AppError::InvalidParams(format!("got {other}"))),
        Err(error) => Err(AppError::InvalidParams(error.to_string())),
    }
}

fn emit<W: Write>(stdout: &mut W, response: &Response) -> Result<(), AppError> {
    let line = serde_json::to_string(response).map_err(AppError::SerialiseOutput)?;
    writeln!(stdout, "{line}").map_err(AppError::Output)
}
