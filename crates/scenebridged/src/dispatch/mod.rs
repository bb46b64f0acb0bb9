//! Command routing.
//!
//! [`Dispatcher`] answers reserved commands inline and resolves everything
//! else to a registry handler. In `queued` mode handler invocations are
//! wrapped in jobs so they run on the single drain thread; the calling
//! connection blocks until the job reports back or the job timeout lapses.

mod errors;
mod reserved;
mod response;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use scenebridge_config::DispatchMode;
use scenebridge_protocol::{Command, Params, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::jobs::{JobId, JobQueue};
use crate::registry::{CommandHandler, CommandRegistry, HandlerError};
use crate::uploads::UploadManager;

pub use errors::DispatchError;
pub use response::ResponseWriter;

use reserved::Reserved;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Controls how registry commands are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Queued or direct execution.
    pub mode: DispatchMode,
    /// How long a connection waits for its job.
    pub job_timeout: Duration,
    /// How often a waiting connection checks the stop flag.
    pub poll_interval: Duration,
}

/// A resolved registry command, ready to run.
pub struct Invocation {
    command: String,
    params: Params,
    handler: Arc<dyn CommandHandler>,
}

impl Invocation {
    /// Name the handler is registered under.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Runs the handler on the calling thread, converting panics into
    /// handler errors.
    ///
    /// # Errors
    ///
    /// Returns the handler's failure, or a failure describing the panic.
    pub fn run(&self) -> Result<Value, HandlerError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.handler.call(&self.params)))
            .unwrap_or_else(|payload| Err(HandlerError::from_panic(&self.command, payload.as_ref())))
    }
}

/// Routing decision for a command.
pub enum Routed {
    /// The bridge answered the command itself.
    Reply(Response),
    /// A registry handler must run.
    Invoke(Invocation),
}

/// Routes commands to reserved handlers, the registry, or the job queue.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    uploads: Arc<UploadManager>,
    jobs: Arc<JobQueue>,
    settings: ExecutionSettings,
}

impl Dispatcher {
    /// Builds a dispatcher over shared bridge state.
    pub fn new(
        registry: Arc<CommandRegistry>,
        uploads: Arc<UploadManager>,
        jobs: Arc<JobQueue>,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            registry,
            uploads,
            jobs,
            settings,
        }
    }

    /// Execution settings in force.
    #[must_use]
    pub const fn settings(&self) -> ExecutionSettings {
        self.settings
    }

    /// Resolves `command` without running any registry handler.
    pub fn route(&self, command: &Command) -> Routed {
        let name = command.name();
        let (target, params) = match reserved::answer(self, name, &command.params) {
            None => (name.to_owned(), command.params.clone()),
            Some(Ok(Reserved::Answer(value))) => return Routed::Reply(Response::ok(value)),
            Some(Ok(Reserved::CallTool {
                tool_name,
                arguments,
            })) => (tool_name, arguments),
            Some(Err(error)) => return Routed::Reply(error.to_response()),
        };
        match self.registry.handler(&target) {
            Some(handler) => Routed::Invoke(Invocation {
                command: target,
                params,
                handler,
            }),
            None => Routed::Reply(DispatchError::unknown_command(target).to_response()),
        }
    }

    /// Routes and runs `command` entirely on the calling thread.
    pub fn dispatch(&self, command: &Command) -> Response {
        match self.route(command) {
            Routed::Reply(response) => response,
            Routed::Invoke(invocation) => into_response(&invocation.command, invocation.run()),
        }
    }

    /// Routes `command` and runs it according to the dispatch mode.
    ///
    /// In queued mode the call blocks until the job completes, the job
    /// timeout lapses, or `stop` is raised.
    pub fn execute(&self, command: &Command, stop: &AtomicBool) -> Response {
        match self.route(command) {
            Routed::Reply(response) => response,
            Routed::Invoke(invocation) => match self.settings.mode {
                DispatchMode::Direct => into_response(&invocation.command, invocation.run()),
                DispatchMode::Queued => self.run_queued(invocation, stop),
            },
        }
    }

    fn run_queued(&self, invocation: Invocation, stop: &AtomicBool) -> Response {
        let command = invocation.command.clone();
        let (sender, receiver) = mpsc::sync_channel(1);
        let job_id = self.jobs.enqueue_with_timeout(
            move || {
                let outcome = invocation.run();
                // The connection may have stopped waiting; the record keeps the result.
                let _ = sender.send(outcome.clone());
                outcome
            },
            self.settings.job_timeout,
        );
        debug!(target: DISPATCH_TARGET, command = %command, job_id = %job_id, "command queued");
        match self.await_job(job_id, &receiver, stop) {
            Ok(outcome) => into_response(&command, outcome),
            Err(error) => {
                warn!(target: DISPATCH_TARGET, command = %command, error = %error, "job not awaited");
                error.to_response()
            }
        }
    }

    fn await_job(
        &self,
        job_id: JobId,
        receiver: &mpsc::Receiver<Result<Value, HandlerError>>,
        stop: &AtomicBool,
    ) -> Result<Result<Value, HandlerError>, DispatchError> {
        let deadline = Instant::now() + self.settings.job_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DispatchError::JobTimeout {
                    job_id,
                    timeout_secs: self.settings.job_timeout.as_secs(),
                });
            }
            match receiver.recv_timeout(remaining.min(self.settings.poll_interval)) {
                Ok(outcome) => return Ok(outcome),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if stop.load(Ordering::SeqCst) {
                        return Err(DispatchError::ShuttingDown { job_id });
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(DispatchError::Internal {
                        message: format!("job {job_id} was dropped before reporting a result"),
                    });
                }
            }
        }
    }
}

fn into_response(command: &str, outcome: Result<Value, HandlerError>) -> Response {
    match outcome {
        Ok(value) => Response::ok(value),
        Err(failure) => {
            debug!(target: DISPATCH_TARGET, command, error = %failure, "handler failed");
            DispatchError::handler_failure(command, failure).to_response()
        }
    }
}

#[cfg(test)]
mod tests;
