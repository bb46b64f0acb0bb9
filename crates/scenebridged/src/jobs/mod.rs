//! Single-writer job queue.
//!
//! Every scene-mutating command is wrapped in a job and executed by
//! [`JobQueue::drain_one`], one at a time, in enqueue order. The daemon drives
//! draining from a dedicated thread (see [`spawn_drain_loop`]); an embedding
//! host may instead call `drain_one` from its own main-loop tick.

mod record;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::periodic::{PeriodicError, PeriodicHandle, Tick};
use crate::registry::HandlerError;

pub use record::{JobSnapshot, JobStatus};
use record::JobRecord;

const JOBS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::jobs");

/// Identifier assigned to each job.
pub type JobId = Uuid;

type JobTask = Box<dyn FnOnce() -> Result<Value, HandlerError> + Send + 'static>;

struct Job {
    id: JobId,
    task: Option<JobTask>,
    timeout: Duration,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    records: HashMap<JobId, JobRecord>,
    executing: Option<JobId>,
}

/// What a single drain step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue was empty.
    Idle,
    /// The head job ran and produced a result.
    Completed(JobId),
    /// The head job ran and failed.
    Failed(JobId),
    /// The head job overran its timeout and was evicted unexecuted.
    TimedOut(JobId),
    /// A job is still running on another caller and within its timeout.
    Stalled(JobId),
}

impl DrainOutcome {
    /// Returns true when a job left the queue.
    #[must_use]
    pub const fn made_progress(self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Failed(_) | Self::TimedOut(_)
        )
    }
}

/// FIFO queue of deferred handler invocations.
pub struct JobQueue {
    state: Mutex<QueueState>,
    default_timeout: Duration,
}

impl JobQueue {
    /// Builds an empty queue whose jobs default to `default_timeout`.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            default_timeout,
        }
    }

    /// Timeout applied by [`JobQueue::enqueue`].
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Appends a job with the default timeout.
    pub fn enqueue<F>(&self, task: F) -> JobId
    where
        F: FnOnce() -> Result<Value, HandlerError> + Send + 'static,
    {
        self.enqueue_with_timeout(task, self.default_timeout)
    }

    /// Appends a job and returns its id immediately.
    pub fn enqueue_with_timeout<F>(&self, task: F, timeout: Duration) -> JobId
    where
        F: FnOnce() -> Result<Value, HandlerError> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let mut state = self.lock_state();
        state.records.insert(id, JobRecord::queued());
        state.pending.push_back(Job {
            id,
            task: Some(Box::new(task)),
            timeout,
        });
        debug!(target: JOBS_TARGET, job_id = %id, depth = state.pending.len(), "job queued");
        id
    }

    /// Runs the head job, if any, to completion on the calling thread.
    ///
    /// Claiming happens under the state lock, so concurrent callers never run
    /// two jobs at once. A caller that finds the head already running checks
    /// it against its timeout instead of waiting: an overdue head is marked
    /// `timeout` and popped, otherwise the call reports [`DrainOutcome::Stalled`].
    /// No further job is claimed until the evicted one returns.
    pub fn drain_one(&self) -> DrainOutcome {
        let (id, task) = match self.claim_head() {
            Ok(claimed) => claimed,
            Err(outcome) => return outcome,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
            Err(HandlerError::from_panic(&id.to_string(), payload.as_ref()))
        });

        let mut state = self.lock_state();
        state.executing = None;
        if state.pending.front().is_some_and(|job| job.id == id) {
            state.pending.pop_front();
        }
        let Some(record) = state.records.get_mut(&id) else {
            return DrainOutcome::Failed(id);
        };
        if record.status == JobStatus::Timeout {
            debug!(target: JOBS_TARGET, job_id = %id, "late result of timed-out job discarded");
            return DrainOutcome::TimedOut(id);
        }
        let status = record.finish(outcome);
        debug!(target: JOBS_TARGET, job_id = %id, status = %status, "job finished");
        if status == JobStatus::Done {
            DrainOutcome::Completed(id)
        } else {
            DrainOutcome::Failed(id)
        }
    }

    fn claim_head(&self) -> Result<(JobId, JobTask), DrainOutcome> {
        let mut state = self.lock_state();
        let QueueState {
            pending,
            records,
            executing,
        } = &mut *state;
        let Some(head) = pending.front_mut() else {
            return Err(DrainOutcome::Idle);
        };
        let id = head.id;
        if let Some(task) = head.task.take_if(|_| executing.is_none()) {
            if let Some(record) = records.get_mut(&id) {
                record.mark_running();
            }
            *executing = Some(id);
            return Ok((id, task));
        }
        if head.task.is_some() {
            // An evicted job is still executing; the head waits for it.
            return Err(DrainOutcome::Stalled(executing.unwrap_or(id)));
        }

        let overdue = records
            .get(&id)
            .and_then(|record| record.started)
            .is_none_or(|started| started.elapsed() > head.timeout);
        if !overdue {
            return Err(DrainOutcome::Stalled(id));
        }
        let timeout = head.timeout;
        pending.pop_front();
        if let Some(record) = records.get_mut(&id) {
            record.time_out(timeout);
        }
        warn!(target: JOBS_TARGET, job_id = %id, ?timeout, "job timed out");
        Err(DrainOutcome::TimedOut(id))
    }

    /// Latest snapshot for `id`, or an `unknown` snapshot.
    #[must_use]
    pub fn status(&self, id: JobId) -> JobSnapshot {
        self.lock_state()
            .records
            .get(&id)
            .map_or_else(|| JobSnapshot::unknown(id.to_string()), |record| record.snapshot(id))
    }

    /// Looks up a job by its textual id; unparsable ids are `unknown`.
    #[must_use]
    pub fn status_of(&self, job_id: &str) -> JobSnapshot {
        match Uuid::parse_str(job_id.trim()) {
            Ok(id) => self.status(id),
            Err(_) => JobSnapshot::unknown(job_id),
        }
    }

    /// Ids still waiting or running, in queue order.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.lock_state().pending.iter().map(|job| job.id).collect()
    }

    /// Number of jobs still waiting or running.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lock_state().pending.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("depth", &self.depth())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Starts the drain thread, ticking every `interval` while the queue is idle.
///
/// # Errors
///
/// Returns [`PeriodicError::Spawn`] when the thread cannot be created.
pub fn spawn_drain_loop(
    queue: Arc<JobQueue>,
    interval: Duration,
) -> Result<PeriodicHandle, PeriodicError> {
    PeriodicHandle::spawn("job-drain", interval, move || {
        if queue.drain_one().made_progress() {
            Tick::Busy
        } else {
            Tick::Idle
        }
    })
}
