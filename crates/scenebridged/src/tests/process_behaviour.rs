//! Lifecycle tests for `run_bridge_with`.

use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};
use scenebridge_config::Config;
use serde_json::json;

use super::support::{HealthEvent, RecordingHealthReporter, TestClient, test_config};
use crate::bootstrap::StaticConfigLoader;
use crate::process::{
    LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, ShutdownTrigger, run_bridge_with,
};
use crate::scene::{SceneStore, reference_registry};
use crate::server::ServeError;
use crate::transport::ListenerError;

/// Shutdown signal released by the test.
struct ChannelShutdown {
    receiver: Mutex<Receiver<()>>,
}

impl ChannelShutdown {
    fn new() -> (Sender<()>, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            sender,
            Self {
                receiver: Mutex::new(receiver),
            },
        )
    }
}

impl ShutdownSignal for ChannelShutdown {
    fn wait(&self) -> Result<ShutdownTrigger, ShutdownError> {
        let receiver = self.receiver.lock().expect("shutdown receiver lock");
        // A dropped sender also means stop.
        let _ = receiver.recv();
        Ok(ShutdownTrigger::Requested)
    }
}

#[fixture]
fn reporter() -> Arc<RecordingHealthReporter> {
    Arc::new(RecordingHealthReporter::default())
}

fn plan(
    config: Config,
    reporter: &Arc<RecordingHealthReporter>,
    shutdown: ChannelShutdown,
) -> LaunchPlan<StaticConfigLoader, ChannelShutdown> {
    LaunchPlan {
        loader: StaticConfigLoader::new(config),
        reporter: Arc::clone(reporter) as Arc<dyn crate::health::HealthReporter>,
        shutdown,
        registry: reference_registry(Arc::new(SceneStore::new())).expect("reference registry"),
    }
}

#[rstest]
fn bridge_serves_until_shutdown_is_signalled(reporter: Arc<RecordingHealthReporter>) {
    let (trigger, shutdown) = ChannelShutdown::new();
    let launch = plan(test_config(), &reporter, shutdown);
    let running = thread::spawn(move || run_bridge_with(launch));

    let address = reporter
        .wait_for_listener(Duration::from_secs(5))
        .expect("listener ready");
    let mut client = TestClient::connect(address);
    let response = client.request(&json!({"type": "protocol_version"}));
    assert_eq!(response["result"], json!("2.0"));

    trigger.send(()).expect("signal shutdown");
    running
        .join()
        .expect("bridge thread")
        .expect("bridge exits cleanly");

    assert_eq!(
        reporter.events(),
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::BootstrapSucceeded,
            HealthEvent::ListenerReady(address),
            HealthEvent::ShutdownStarted,
            HealthEvent::ShutdownCompleted,
        ]
    );
}

#[rstest]
fn occupied_port_is_fatal(reporter: Arc<RecordingHealthReporter>) {
    let occupied = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
    let port = occupied.local_addr().expect("reserved address").port();
    let (_trigger, shutdown) = ChannelShutdown::new();
    let config = Config {
        listen_host: "127.0.0.1".to_owned(),
        listen_port: port,
        ..test_config()
    };

    let error = run_bridge_with(plan(config, &reporter, shutdown)).expect_err("bind must fail");
    assert!(
        matches!(
            error,
            LaunchError::Serve(ServeError::Listener(ListenerError::BindTcp { .. }))
        ),
        "unexpected error: {error:?}"
    );
    assert!(!reporter
        .events()
        .iter()
        .any(|event| matches!(event, HealthEvent::ListenerReady(_))));
}

#[rstest]
fn invalid_allow_list_fails_bootstrap(reporter: Arc<RecordingHealthReporter>) {
    let (_trigger, shutdown) = ChannelShutdown::new();
    let config = Config {
        allowed_peers: vec!["not-an-address".to_owned()],
        ..test_config()
    };

    let error = run_bridge_with(plan(config, &reporter, shutdown)).expect_err("bootstrap must fail");
    assert!(matches!(error, LaunchError::Bootstrap(_)), "unexpected error: {error:?}");
    let events = reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(matches!(
        events.last(),
        Some(HealthEvent::BootstrapFailed(message)) if message.contains("allow-list")
    ));
}
