//! Response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome reported in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// The command completed.
    Ok,
    /// The command failed; `message` explains why.
    Error,
}

/// Response sent for every command, tagged by `status`.
///
/// `protocol_version` is absent on freshly built responses and filled in by
/// [`Response::stamp`] immediately before transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Successful completion.
    Ok {
        /// Handler return value, passed through verbatim.
        #[serde(default)]
        result: Value,
        /// Version of the protocol spoken by the sender.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol_version: Option<String>,
    },
    /// Failed completion.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Diagnostic trace for programmer errors.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
        /// Version of the protocol spoken by the sender.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol_version: Option<String>,
    },
}

impl Response {
    /// Wraps a handler result.
    #[must_use]
    pub const fn ok(result: Value) -> Self {
        Self::Ok {
            result,
            protocol_version: None,
        }
    }

    /// Builds an error response without a trace.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback: None,
            protocol_version: None,
        }
    }

    /// Builds an error response carrying a diagnostic trace.
    #[must_use]
    pub fn error_with_traceback(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback: Some(traceback.into()),
            protocol_version: None,
        }
    }

    /// Sets the protocol version, replacing any previous value.
    #[must_use]
    pub fn stamp(mut self, version: &str) -> Self {
        match &mut self {
            Self::Ok {
                protocol_version, ..
            }
            | Self::Error {
                protocol_version, ..
            } => *protocol_version = Some(version.to_owned()),
        }
        self
    }

    /// Returns the response status.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        match self {
            Self::Ok { .. } => ResponseStatus::Ok,
            Self::Error { .. } => ResponseStatus::Error,
        }
    }

    /// Returns true for `ok` responses.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Returns the result of an `ok` response.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match self {
            Self::Ok { result, .. } => Some(result),
            Self::Error { .. } => None,
        }
    }

    /// Returns the message of an `error` response.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { message, .. } => Some(message.as_str()),
        }
    }

    /// Returns the traceback of an `error` response, if any.
    #[must_use]
    pub fn traceback(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { traceback, .. } => traceback.as_deref(),
        }
    }

    /// Returns the stamped protocol version, if any.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        match self {
            Self::Ok {
                protocol_version, ..
            }
            | Self::Error {
                protocol_version, ..
            } => protocol_version.as_deref(),
        }
    }
}
