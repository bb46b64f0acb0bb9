//! Health reporter double that keeps every lifecycle event.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::health::{HealthReporter, LifecycleEvent};

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ListenerReady(SocketAddr),
    ShutdownStarted,
    ShutdownCompleted,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }

    /// Waits for the listener address to be reported.
    pub(crate) fn wait_for_listener(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let ready = self.events().into_iter().find_map(|event| match event {
                HealthEvent::ListenerReady(address) => Some(address),
                _ => None,
            });
            if ready.is_some() {
                return ready;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        None
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn report(&self, event: LifecycleEvent<'_>) {
        self.record(match event {
            LifecycleEvent::BootstrapStarting => HealthEvent::BootstrapStarting,
            LifecycleEvent::BootstrapSucceeded(_) => HealthEvent::BootstrapSucceeded,
            LifecycleEvent::BootstrapFailed(error) => HealthEvent::BootstrapFailed(error.to_string()),
            LifecycleEvent::ListenerReady(address) => HealthEvent::ListenerReady(address),
            LifecycleEvent::ShutdownStarted => HealthEvent::ShutdownStarted,
            LifecycleEvent::ShutdownCompleted => HealthEvent::ShutdownCompleted,
        });
    }
}
