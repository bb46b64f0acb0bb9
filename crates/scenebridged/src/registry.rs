//! Name-keyed registry of scene command handlers.
//!
//! The registry is assembled once at startup through [`RegistryBuilder`] and
//! shared read-only behind an `Arc` afterwards. Each entry pairs a handler with
//! a [`ToolDescriptor`] so clients can discover commands through `list_tools`.

use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use scenebridge_protocol::{Params, reserved};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Outcome returned by command handlers.
pub type HandlerResult = Result<Value, HandlerError>;

/// Failure reported by a command handler.
///
/// The message is sent to the client verbatim; the optional traceback carries
/// diagnostic detail such as an error source chain or a panic payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    traceback: Option<String>,
}

impl HandlerError {
    /// Builds a handler error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    /// Builds an error describing unusable parameters.
    pub fn invalid_params(message: impl fmt::Display) -> Self {
        Self::new(format!("invalid params: {message}"))
    }

    /// Builds a handler error from an error value, recording its source chain
    /// as the traceback.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        let traceback = if chain.is_empty() {
            None
        } else {
            Some(chain.join("\n"))
        };
        Self {
            message: error.to_string(),
            traceback,
        }
    }

    /// Converts a caught panic payload into a handler error.
    pub fn from_panic(command: &str, payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self {
            message: format!("command '{command}' panicked: {detail}"),
            traceback: Some(format!("panic in handler '{command}': {detail}")),
        }
    }

    /// Attaches a traceback string.
    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Message reported to the client.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostic traceback, when one was captured.
    #[must_use]
    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }
}

/// Handler invoked with the decoded parameter map of a command.
///
/// Any `Fn(&Params) -> HandlerResult` closure that is `Send + Sync` already
/// implements this trait.
pub trait CommandHandler: Send + Sync + 'static {
    /// Runs the command.
    fn call(&self, params: &Params) -> HandlerResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&Params) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, params: &Params) -> HandlerResult {
        self(params)
    }
}

/// Argument metadata advertised for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgSpec {
    /// Parameter key.
    pub name: String,
    /// Informal type name, e.g. `str` or `list[float]`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl ArgSpec {
    /// Describes a parameter by key and type name.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            desc: None,
        }
    }

    /// Adds a human description.
    #[must_use]
    pub fn describe(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }
}

/// Metadata returned by `list_tools`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    /// Command name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Accepted parameters.
    pub args: Vec<ArgSpec>,
}

impl ToolDescriptor {
    /// Starts a descriptor with no arguments.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }
}

struct RegisteredCommand {
    descriptor: ToolDescriptor,
    handler: Arc<dyn CommandHandler>,
}

/// Errors raised while assembling a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name was registered twice.
    #[error("command '{name}' is registered more than once")]
    Duplicate {
        /// Offending name.
        name: String,
    },
    /// The name collides with a command the bridge answers itself.
    #[error("command '{name}' is reserved by the bridge")]
    Reserved {
        /// Offending name.
        name: String,
    },
    /// The name was empty or whitespace.
    #[error("command names must not be blank")]
    BlankName,
}

/// Immutable mapping from command name to handler.
pub struct CommandRegistry {
    commands: BTreeMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with no commands.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Descriptors for every command, sorted by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.commands.values().map(|entry| &entry.descriptor)
    }

    /// Returns true when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Looks up the handler for `name`.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands
            .get(name)
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true when no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

/// Accumulates commands before freezing them into a [`CommandRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    commands: BTreeMap<String, RegisteredCommand>,
    error: Option<RegistryError>,
}

impl RegistryBuilder {
    /// Registers a handler under `descriptor.name`.
    ///
    /// Registration problems are deferred to [`RegistryBuilder::build`] so
    /// calls can be chained.
    #[must_use]
    pub fn register<H>(mut self, descriptor: ToolDescriptor, handler: H) -> Self
    where
        H: CommandHandler,
    {
        if self.error.is_some() {
            return self;
        }
        let name = descriptor.name.trim().to_owned();
        if name.is_empty() {
            self.error = Some(RegistryError::BlankName);
            return self;
        }
        if reserved::is_reserved(&name) {
            self.error = Some(RegistryError::Reserved { name });
            return self;
        }
        if self.commands.contains_key(&name) {
            self.error = Some(RegistryError::Duplicate { name });
            return self;
        }
        let descriptor = ToolDescriptor {
            name: name.clone(),
            ..descriptor
        };
        self.commands.insert(
            name,
            RegisteredCommand {
                descriptor,
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] encountered during registration.
    pub fn build(self) -> Result<CommandRegistry, RegistryError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(CommandRegistry {
                commands: self.commands,
            }),
        }
    }
}
