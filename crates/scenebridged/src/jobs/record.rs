//! Job status bookkeeping.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use strum::Display;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::registry::HandlerError;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue.
    Queued,
    /// Executing on the drain thread.
    Running,
    /// Finished with a result.
    Done,
    /// Finished with a handler failure.
    Error,
    /// Evicted after overrunning its timeout.
    Timeout,
    /// Never seen by this queue.
    Unknown,
}

impl JobStatus {
    /// Returns true once the job can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Timeout)
    }
}

/// Point-in-time view of a job, as returned by `get_job_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub job_id: String,
    /// Current state.
    pub status: JobStatus,
    /// Handler result once `done`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure message once `error` or `timeout`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure traceback, when captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    /// RFC 3339 enqueue time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<String>,
    /// RFC 3339 start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// RFC 3339 completion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl JobSnapshot {
    /// Snapshot for an id the queue has never seen.
    pub fn unknown(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Unknown,
            result: None,
            error: None,
            traceback: None,
            enqueued_at: None,
            started_at: None,
            ended_at: None,
        }
    }
}

#[derive(Debug)]
pub(super) struct JobRecord {
    pub(super) status: JobStatus,
    pub(super) result: Option<Value>,
    pub(super) failure: Option<HandlerError>,
    pub(super) enqueued_at: OffsetDateTime,
    pub(super) started_at: Option<OffsetDateTime>,
    pub(super) started: Option<Instant>,
    pub(super) ended_at: Option<OffsetDateTime>,
}

impl JobRecord {
    pub(super) fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            result: None,
            failure: None,
            enqueued_at: OffsetDateTime::now_utc(),
            started_at: None,
            started: None,
            ended_at: None,
        }
    }

    pub(super) fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(OffsetDateTime::now_utc());
        self.started = Some(Instant::now());
    }

    pub(super) fn finish(&mut self, outcome: Result<Value, HandlerError>) -> JobStatus {
        self.ended_at = Some(OffsetDateTime::now_utc());
        self.status = match outcome {
            Ok(value) => {
                self.result = Some(value);
                JobStatus::Done
            }
            Err(failure) => {
                self.failure = Some(failure);
                JobStatus::Error
            }
        };
        self.status
    }

    pub(super) fn time_out(&mut self, timeout: Duration) {
        self.ended_at = Some(OffsetDateTime::now_utc());
        self.status = JobStatus::Timeout;
        self.failure = Some(HandlerError::new(format!(
            "job exceeded its {}ms timeout",
            timeout.as_millis()
        )));
    }

    pub(super) fn snapshot(&self, id: Uuid) -> JobSnapshot {
        JobSnapshot {
            job_id: id.to_string(),
            status: self.status,
            result: self.result.clone(),
            error: self.failure.as_ref().map(|failure| failure.message().to_owned()),
            traceback: self
                .failure
                .as_ref()
                .and_then(HandlerError::traceback)
                .map(str::to_owned),
            enqueued_at: rfc3339(self.enqueued_at),
            started_at: self.started_at.and_then(rfc3339),
            ended_at: self.ended_at.and_then(rfc3339),
        }
    }
}

fn rfc3339(moment: OffsetDateTime) -> Option<String> {
    moment.format(&Rfc3339).ok()
}
