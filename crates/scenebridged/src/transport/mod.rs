//! Socket transport for the bridge.
//!
//! The listener accepts TCP connections on a background thread, applies the
//! admission policy, and hands each admitted connection to a
//! [`ConnectionHandler`] on its own thread.

mod admission;
mod errors;
mod handler;
mod listener;
mod session;
#[cfg(test)]
mod test_utils;

pub use self::admission::{AdmissionDenied, AdmissionPolicy, ConnectionLimiter, ConnectionPermit};
pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::session::{CommandSession, SessionEnd, SessionLimits};
#[cfg(test)]
pub(crate) use self::test_utils::PeerRecorder;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
