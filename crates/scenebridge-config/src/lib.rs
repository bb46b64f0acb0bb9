//! Shared configuration for the SceneBridge daemon and CLI.
//!
//! Values are layered by `ortho_config`: compiled defaults, then a
//! configuration file, then `SCENEBRIDGE_*` environment variables, then
//! command-line flags. Durations are stored as integer milliseconds or seconds
//! so every layer can express them; the accessors convert to [`Duration`].

mod defaults;
mod logging;
mod mode;
mod peers;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ALLOWED_PEERS, DEFAULT_DRAIN_INTERVAL_MS, DEFAULT_JOB_TIMEOUT_SECS,
    DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT, DEFAULT_LOG_FILTER, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_UPLOAD_EXPIRY_SECS, DEFAULT_WRITE_TIMEOUT_MS, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use mode::DispatchMode;
pub use peers::{LOCALHOST_ALIAS, PeerAllowList, PeerAllowListError};

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SCENEBRIDGE")]
pub struct Config {
    /// Host the listener binds to.
    #[serde(default = "defaults::listen_host")]
    pub listen_host: String,
    /// Port the listener binds to.
    #[serde(default = "defaults::listen_port")]
    pub listen_port: u16,
    /// Peer addresses allowed to connect; empty admits everyone.
    #[serde(default = "defaults::allowed_peers")]
    pub allowed_peers: Vec<String>,
    /// Ceiling on concurrently active connections.
    #[serde(default = "defaults::max_connections")]
    pub max_connections: usize,
    /// Ceiling on bytes buffered for one message.
    #[serde(default = "defaults::max_message_bytes")]
    pub max_message_bytes: usize,
    /// Bounded wait for each socket read, in milliseconds.
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Socket write timeout, in milliseconds.
    #[serde(default = "defaults::write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Default job timeout, in seconds.
    #[serde(default = "defaults::job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Interval between drain ticks, in milliseconds.
    #[serde(default = "defaults::drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Lifetime of an upload session, in seconds.
    #[serde(default = "defaults::upload_expiry_secs")]
    pub upload_expiry_secs: u64,
    /// Ceiling on an assembled upload, in bytes.
    #[serde(default = "defaults::max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Directory receiving finalized uploads; uploads are discarded when unset.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    /// Whether registry commands are queued or run on the connection thread.
    #[serde(default = "defaults::dispatch_mode")]
    pub dispatch_mode: DispatchMode,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: defaults::listen_host(),
            listen_port: defaults::listen_port(),
            allowed_peers: defaults::allowed_peers(),
            max_connections: defaults::max_connections(),
            max_message_bytes: defaults::max_message_bytes(),
            read_timeout_ms: defaults::read_timeout_ms(),
            write_timeout_ms: defaults::write_timeout_ms(),
            job_timeout_secs: defaults::job_timeout_secs(),
            drain_interval_ms: defaults::drain_interval_ms(),
            upload_expiry_secs: defaults::upload_expiry_secs(),
            max_upload_bytes: defaults::max_upload_bytes(),
            upload_dir: None,
            dispatch_mode: defaults::dispatch_mode(),
            log_filter: defaults::default_log_filter(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Host and port the listener binds to.
    #[must_use]
    pub fn listen_address(&self) -> (&str, u16) {
        (self.listen_host.as_str(), self.listen_port)
    }

    /// Parses the configured allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`PeerAllowListError`] when an entry is not an IP address or
    /// `localhost`.
    pub fn allow_list(&self) -> Result<PeerAllowList, PeerAllowListError> {
        PeerAllowList::parse(&self.allowed_peers)
    }

    /// Bounded wait for each socket read. Never zero, since a zero read
    /// timeout is rejected by the socket layer.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    /// Socket write timeout. Never zero.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }

    /// Default job timeout.
    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Interval between drain ticks.
    #[must_use]
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms.max(1))
    }

    /// Lifetime of an upload session.
    #[must_use]
    pub const fn upload_expiry(&self) -> Duration {
        Duration::from_secs(self.upload_expiry_secs)
    }

    /// Directory receiving finalized uploads.
    #[must_use]
    pub fn upload_dir(&self) -> Option<&Path> {
        self.upload_dir.as_deref()
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = Config::default();
        assert_eq!(config.listen_address(), ("127.0.0.1", 9876));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.max_message_bytes, 2 * 1024 * 1024);
        assert_eq!(config.job_timeout(), Duration::from_secs(30));
        assert_eq!(config.upload_expiry(), Duration::from_secs(60));
        assert_eq!(config.dispatch_mode, DispatchMode::Queued);
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[test]
    fn zero_read_timeout_is_clamped() {
        let config = Config {
            read_timeout_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.read_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn default_allow_list_is_loopback_only() {
        let list = Config::default().allow_list().expect("default allow-list");
        assert!(!list.is_open());
        assert!(list.permits("127.0.0.1".parse().expect("ip")));
        assert!(!list.permits("192.0.2.1".parse().expect("ip")));
    }
}
