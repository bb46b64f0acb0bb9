//! Background threads that repeat a unit of work until asked to stop.
//!
//! The drain loop and the upload reaper both run here. Each tick reports
//! whether more work is immediately available; idle ticks sleep for the
//! configured interval so the stop flag is observed within one interval.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const PERIODIC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::periodic");

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Work remains; tick again without sleeping.
    Busy,
    /// Nothing to do until the next interval.
    Idle,
}

/// Errors raised by periodic task threads.
#[derive(Debug, Error)]
pub enum PeriodicError {
    /// Spawning the thread failed.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name.
        name: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The thread panicked.
    #[error("{name} thread panicked")]
    ThreadPanic {
        /// Thread name.
        name: &'static str,
    },
}

/// Handle to a running periodic thread.
#[derive(Debug)]
pub struct PeriodicHandle {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PeriodicHandle {
    /// Spawns `name`, calling `tick` until [`PeriodicHandle::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicError::Spawn`] when the OS refuses the thread.
    pub fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> Result<Self, PeriodicError>
    where
        F: FnMut() -> Tick + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                debug!(target: PERIODIC_TARGET, task = name, "periodic task started");
                while !flag.load(Ordering::SeqCst) {
                    if tick() == Tick::Idle {
                        thread::sleep(interval);
                    }
                }
                debug!(target: PERIODIC_TARGET, task = name, "periodic task stopped");
            })
            .map_err(|source| PeriodicError::Spawn { name, source })?;
        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    /// Asks the thread to stop after its current tick.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the thread to exit.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodicError::ThreadPanic`] if the tick panicked.
    pub fn join(mut self) -> Result<(), PeriodicError> {
        self.shutdown();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PeriodicError::ThreadPanic { name: self.name }),
            None => Ok(()),
        }
    }
}

impl Drop for PeriodicHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
