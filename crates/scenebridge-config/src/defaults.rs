//! Default values shared by the daemon and the CLI.

use crate::logging::LogFormat;
use crate::mode::DispatchMode;

/// Default bind host. Loopback only, so remote peers need explicit opt-in.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";

/// Default TCP port.
pub const DEFAULT_LISTEN_PORT: u16 = 9876;

/// Default peer allow-list.
pub const DEFAULT_ALLOWED_PEERS: &[&str] = &["127.0.0.1", "localhost"];

/// Default ceiling on concurrently active connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default ceiling on bytes buffered for a single message (2 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 2 * 1024 * 1024;

/// Default bounded wait for a socket read, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1_000;

/// Default socket write timeout, in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Default per-job timeout, in seconds.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 30;

/// Default interval between drain ticks, in milliseconds.
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 100;

/// Default lifetime of an upload session, in seconds.
pub const DEFAULT_UPLOAD_EXPIRY_SECS: u64 = 60;

/// Default ceiling on an assembled upload (256 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

pub(crate) fn listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_owned()
}

pub(crate) const fn listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

pub(crate) fn allowed_peers() -> Vec<String> {
    DEFAULT_ALLOWED_PEERS
        .iter()
        .map(|peer| (*peer).to_owned())
        .collect()
}

pub(crate) const fn max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

pub(crate) const fn max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

pub(crate) const fn read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

pub(crate) const fn write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

pub(crate) const fn job_timeout_secs() -> u64 {
    DEFAULT_JOB_TIMEOUT_SECS
}

pub(crate) const fn drain_interval_ms() -> u64 {
    DEFAULT_DRAIN_INTERVAL_MS
}

pub(crate) const fn upload_expiry_secs() -> u64 {
    DEFAULT_UPLOAD_EXPIRY_SECS
}

pub(crate) const fn max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

pub(crate) const fn dispatch_mode() -> DispatchMode {
    DispatchMode::Queued
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
