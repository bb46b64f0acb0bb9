//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scenebridge_config::{DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT};

use crate::client::{DEFAULT_CHUNK_BYTES, DEFAULT_CONNECT_ATTEMPTS};

/// Command-line client for the scene bridge.
#[derive(Parser, Debug)]
#[command(name = "scenebridge", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Bridge host.
    #[arg(long, default_value = DEFAULT_LISTEN_HOST)]
    pub(crate) host: String,
    /// Bridge port.
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    pub(crate) port: u16,
    /// Connection attempts before giving up.
    #[arg(long, default_value_t = DEFAULT_CONNECT_ATTEMPTS)]
    pub(crate) retries: u32,
    /// Delay before the first reconnect, doubling after each failure.
    #[arg(long, value_name = "MS", default_value_t = 1_000)]
    pub(crate) retry_delay_ms: u64,
    /// Seconds to wait for each response.
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub(crate) timeout_secs: u64,
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Sends one command and prints the response.
    Send {
        /// Command type, for example `create_object`.
        #[arg(value_name = "TYPE")]
        kind: String,
        /// Parameters as a JSON object.
        #[arg(value_name = "PARAMS_JSON")]
        params: Option<String>,
    },
    /// Uploads a file through the chunked upload commands.
    Upload {
        /// File to send.
        file: PathBuf,
        /// Raw bytes per chunk.
        #[arg(long, default_value_t = DEFAULT_CHUNK_BYTES)]
        chunk_bytes: usize,
    },
}
