//! Request envelope.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Structured parameters passed to a command handler.
pub type Params = Map<String, Value>;

/// A single client request.
///
/// `type` selects the handler; `params` defaults to an empty map when it is
/// absent or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command name, serialised as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Handler parameters.
    #[serde(default, deserialize_with = "params_or_null")]
    pub params: Params,
}

impl Command {
    /// Builds a command with the given parameters.
    #[must_use]
    pub fn new(kind: impl Into<String>, params: Params) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Builds a command without parameters.
    #[must_use]
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Params::new())
    }

    /// Interprets a decoded JSON value as a command.
    ///
    /// # Errors
    ///
    /// Returns the deserialisation error when the value is not an object with
    /// a string `type` field and an object (or null) `params` field.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Returns the trimmed command name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.kind.trim()
    }
}

fn params_or_null<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Params>::deserialize(deserializer).map(Option::unwrap_or_default)
}
