//! Assembly of the bridge from configuration and a command registry.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scenebridge_config::{Config, PeerAllowList, PeerAllowListError};
use thiserror::Error;
use tracing::info;

use crate::dispatch::{Dispatcher, ExecutionSettings};
use crate::jobs::{self, JobQueue};
use crate::periodic::{PeriodicError, PeriodicHandle};
use crate::registry::CommandRegistry;
use crate::transport::{
    AdmissionPolicy, CommandSession, ListenerError, ListenerHandle, SessionLimits, SocketListener,
};
use crate::uploads::{self, DirectorySink, DiscardSink, UploadLimits, UploadManager, UploadSink};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");
const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Errors raised while assembling a bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The configured allow-list did not parse.
    #[error("invalid peer allow-list: {source}")]
    AllowList {
        /// Parse failure.
        #[source]
        source: PeerAllowListError,
    },
    /// The upload directory could not be prepared.
    #[error("failed to prepare upload directory {}: {source}", path.display())]
    UploadDir {
        /// Configured directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while starting or stopping a bridge.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener failed; binding failures land here.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// A background thread failed.
    #[error(transparent)]
    Thread(#[from] PeriodicError),
}

/// Fully wired bridge, ready to serve.
pub struct Bridge {
    config: Config,
    allow_list: PeerAllowList,
    uploads: Arc<UploadManager>,
    jobs: Arc<JobQueue>,
    dispatcher: Arc<Dispatcher>,
    drive_jobs: bool,
}

impl Bridge {
    /// Wires a bridge whose uploads go to the configured directory, or are
    /// discarded when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when the allow-list is invalid or the upload
    /// directory cannot be created.
    pub fn new(config: Config, registry: CommandRegistry) -> Result<Self, BridgeError> {
        let sink: Arc<dyn UploadSink> = match config.upload_dir() {
            Some(dir) => Arc::new(DirectorySink::create(dir).map_err(|source| {
                BridgeError::UploadDir {
                    path: dir.to_path_buf(),
                    source,
                }
            })?),
            None => Arc::new(DiscardSink),
        };
        Self::with_sink(config, registry, sink)
    }

    /// Wires a bridge delivering finalized uploads to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AllowList`] when the allow-list is invalid.
    pub fn with_sink(
        config: Config,
        registry: CommandRegistry,
        sink: Arc<dyn UploadSink>,
    ) -> Result<Self, BridgeError> {
        let allow_list = config
            .allow_list()
            .map_err(|source| BridgeError::AllowList { source })?;
        let uploads = Arc::new(UploadManager::new(
            UploadLimits {
                expiry: config.upload_expiry(),
                max_bytes: config.max_upload_bytes,
            },
            sink,
        ));
        let jobs = Arc::new(JobQueue::new(config.job_timeout()));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            Arc::clone(&uploads),
            Arc::clone(&jobs),
            ExecutionSettings {
                mode: config.dispatch_mode,
                job_timeout: config.job_timeout(),
                poll_interval: config.read_timeout(),
            },
        ));
        Ok(Self {
            config,
            allow_list,
            uploads,
            jobs,
            dispatcher,
            drive_jobs: true,
        })
    }

    /// Leaves job draining to the embedding host, which must call
    /// [`JobQueue::drain_one`] from its own loop.
    #[must_use]
    pub fn with_external_drain(mut self) -> Self {
        self.drive_jobs = false;
        self
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared job queue.
    #[must_use]
    pub fn jobs(&self) -> Arc<JobQueue> {
        Arc::clone(&self.jobs)
    }

    /// Shared upload table.
    #[must_use]
    pub fn uploads(&self) -> Arc<UploadManager> {
        Arc::clone(&self.uploads)
    }

    /// Shared dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Binds the listener and starts every background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Listener`] when binding fails; this is the one
    /// fatal startup condition.
    pub fn serve(self) -> Result<RunningBridge, ServeError> {
        let (host, port) = self.config.listen_address();
        let listener = SocketListener::bind(host, port)?;

        let drain = if self.drive_jobs {
            Some(jobs::spawn_drain_loop(
                Arc::clone(&self.jobs),
                self.config.drain_interval(),
            )?)
        } else {
            None
        };
        let reaper = uploads::spawn_reaper(Arc::clone(&self.uploads), REAP_INTERVAL)?;

        let session = Arc::new(CommandSession::new(
            Arc::clone(&self.dispatcher),
            SessionLimits {
                max_message_bytes: self.config.max_message_bytes,
                read_timeout: self.config.read_timeout(),
                write_timeout: self.config.write_timeout(),
            },
        ));
        let admission = AdmissionPolicy::new(self.allow_list, self.config.max_connections);
        let listener = listener.start(session, admission)?;
        info!(
            target: SERVER_TARGET,
            address = %listener.local_addr(),
            mode = %self.config.dispatch_mode,
            "bridge serving"
        );
        Ok(RunningBridge {
            listener,
            drain,
            reaper,
            jobs: self.jobs,
        })
    }
}

/// Bridge whose listener and background threads are running.
#[derive(Debug)]
pub struct RunningBridge {
    listener: ListenerHandle,
    drain: Option<PeriodicHandle>,
    reaper: PeriodicHandle,
    jobs: Arc<JobQueue>,
}

impl RunningBridge {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Connections currently admitted.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.listener.active_connections()
    }

    /// Shared job queue.
    #[must_use]
    pub fn jobs(&self) -> Arc<JobQueue> {
        Arc::clone(&self.jobs)
    }

    /// Raises every stop flag and waits for the threads to exit. A job that
    /// is already running finishes first.
    ///
    /// # Errors
    ///
    /// Returns the first thread failure observed.
    pub fn stop(self) -> Result<(), ServeError> {
        let Self {
            listener,
            drain,
            reaper,
            ..
        } = self;
        listener.shutdown();
        if let Some(drain) = &drain {
            drain.shutdown();
        }
        reaper.shutdown();
        listener.join()?;
        if let Some(drain) = drain {
            drain.join()?;
        }
        reaper.join()?;
        info!(target: SERVER_TARGET, "bridge stopped");
        Ok(())
    }
}
