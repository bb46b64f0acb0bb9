//! Connection handling abstractions for the bridge listener.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Accepted TCP connection together with its peer address.
#[derive(Debug)]
pub struct ConnectionStream {
    stream: TcpStream,
    peer: SocketAddr,
}

impl ConnectionStream {
    /// Wraps an accepted stream.
    #[must_use]
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Remote address of the client.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Applies read and write timeouts. Zero durations are rejected by the
    /// socket layer, so callers pass non-zero values.
    ///
    /// # Errors
    ///
    /// Returns the socket error when a timeout cannot be set.
    pub fn set_timeouts(&self, read: Duration, write: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(read))?;
        self.stream.set_write_timeout(Some(write))
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection until it ends. `stop` is raised when the
    /// listener shuts down; long-running handlers should poll it.
    /// Implementations should avoid panicking.
    fn handle(&self, stream: ConnectionStream, stop: &AtomicBool);
}
