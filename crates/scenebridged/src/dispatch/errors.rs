//! Error types for command dispatch failures.
//!
//! Every variant converts into an error [`Response`] at the dispatch
//! boundary, so a failing command never tears down its connection unless the
//! session loop decides to close for its own reasons.

use std::io;

use scenebridge_protocol::{FrameError, Response};
use thiserror::Error;
use uuid::Uuid;

use crate::registry::HandlerError;
use crate::uploads::UploadError;

/// Errors surfaced while decoding, routing or running a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The buffered bytes were not valid JSON.
    #[error("Invalid JSON: {source}")]
    MalformedMessage {
        /// Decoder failure.
        #[source]
        source: FrameError,
    },

    /// The JSON value was not a command object.
    #[error("invalid command: {message}")]
    InvalidCommand {
        /// Why the value was rejected.
        message: String,
    },

    /// No handler is registered under the name.
    #[error("Unknown command type: {command}")]
    UnknownCommand {
        /// Requested name.
        command: String,
    },

    /// A reserved command was sent unusable parameters.
    #[error("invalid params for '{command}': {message}")]
    InvalidParams {
        /// Command name.
        command: String,
        /// What was wrong.
        message: String,
    },

    /// The handler returned an error or panicked.
    #[error("{}", failure.message())]
    HandlerFailure {
        /// Command name.
        command: String,
        /// Failure reported by the handler.
        failure: HandlerError,
    },

    /// An upload operation failed.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The buffered message crossed the size ceiling.
    #[error("Message too large: {size} bytes exceeds {max_size} byte limit")]
    MessageTooLarge {
        /// Bytes buffered.
        size: usize,
        /// Configured ceiling.
        max_size: usize,
    },

    /// The job did not finish while the connection waited.
    #[error(
        "job {job_id} did not complete within {timeout_secs}s; poll get_job_status for its result"
    )]
    JobTimeout {
        /// Queued job.
        job_id: Uuid,
        /// Wait budget in seconds.
        timeout_secs: u64,
    },

    /// The bridge stopped while the connection waited for a job.
    #[error("bridge is shutting down; job {job_id} was not awaited")]
    ShuttingDown {
        /// Queued job.
        job_id: Uuid,
    },

    /// A job was dropped without reporting back.
    #[error("internal error: {message}")]
    Internal {
        /// Description.
        message: String,
    },

    /// Writing a response failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialising a response failed.
    #[error("failed to serialize response: {0}")]
    SerializeResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates an `UnknownCommand` error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates an `InvalidCommand` error.
    pub fn invalid_command(message: impl ToString) -> Self {
        Self::InvalidCommand {
            message: message.to_string(),
        }
    }

    /// Creates an `InvalidParams` error.
    pub fn invalid_params(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a `HandlerFailure` error.
    pub fn handler_failure(command: impl Into<String>, failure: HandlerError) -> Self {
        Self::HandlerFailure {
            command: command.into(),
            failure,
        }
    }

    /// Converts the error into the envelope sent to the client.
    ///
    /// Handler failures always carry a traceback: the handler's own when it
    /// supplied one, otherwise a line naming the failing command.
    #[must_use]
    pub fn to_response(&self) -> Response {
        match self {
            Self::HandlerFailure { command, failure } => {
                let traceback = failure.traceback().map_or_else(
                    || format!("command '{command}' failed: {}", failure.message()),
                    str::to_owned,
                );
                Response::error_with_traceback(failure.message(), traceback)
            }
            other => Response::error(other.to_string()),
        }
    }
}
