//! Shared helpers for the behaviour suites.

mod client;
mod reporter;

use std::net::SocketAddr;
use std::sync::Arc;

use scenebridge_config::Config;

use crate::scene::{SceneStore, reference_registry};
use crate::server::{Bridge, RunningBridge};
use crate::uploads::{MemorySink, UploadSink};

pub(crate) use client::TestClient;
pub(crate) use reporter::{HealthEvent, RecordingHealthReporter};

/// Configuration tuned for fast tests: ephemeral port, short polls.
pub(crate) fn test_config() -> Config {
    Config {
        listen_port: 0,
        read_timeout_ms: 20,
        drain_interval_ms: 5,
        job_timeout_secs: 5,
        ..Config::default()
    }
}

/// Bridge serving the reference scene on an ephemeral port.
pub(crate) struct TestBridge {
    running: Option<RunningBridge>,
    pub(crate) scene: Arc<SceneStore>,
    pub(crate) sink: Arc<MemorySink>,
    pub(crate) jobs: Arc<crate::jobs::JobQueue>,
}

impl TestBridge {
    pub(crate) fn start(config: Config) -> Self {
        Self::launch(config, false)
    }

    pub(crate) fn start_with_external_drain(config: Config) -> Self {
        Self::launch(config, true)
    }

    fn launch(config: Config, external_drain: bool) -> Self {
        let scene = Arc::new(SceneStore::new());
        let sink = Arc::new(MemorySink::new());
        let registry = reference_registry(Arc::clone(&scene)).expect("reference registry");
        let mut bridge = Bridge::with_sink(config, registry, Arc::clone(&sink) as Arc<dyn UploadSink>)
            .expect("assemble bridge");
        if external_drain {
            bridge = bridge.with_external_drain();
        }
        let jobs = bridge.jobs();
        let running = bridge.serve().expect("serve bridge");
        Self {
            running: Some(running),
            scene,
            sink,
            jobs,
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.running
            .as_ref()
            .map(RunningBridge::local_addr)
            .expect("bridge running")
    }

    pub(crate) fn connect(&self) -> TestClient {
        TestClient::connect(self.addr())
    }

    pub(crate) fn active_connections(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, RunningBridge::active_connections)
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop();
        }
    }
}
