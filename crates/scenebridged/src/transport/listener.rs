//! TCP listener and accept loop.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::admission::{AdmissionPolicy, ConnectionLimiter};
use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the configured address.
#[derive(Debug)]
pub struct SocketListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl SocketListener {
    /// Resolves `host:port` and binds the first address.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::BindTcp`] when the address is unavailable,
    /// or a resolution error when the host does not resolve.
    pub fn bind(host: &str, port: u16) -> Result<Self, ListenerError> {
        let listener = bind_tcp(host, port)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, with the real port when `0` was requested.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an error when the socket cannot be made non-blocking or the
    /// thread cannot be spawned.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        admission: AdmissionPolicy,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let limiter = admission.limiter();
        let local_addr = self.local_addr;
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("bridge-accept".to_owned())
            .spawn(move || run_accept_loop(&self, &shutdown_flag, &handler, &admission))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
            limiter,
            local_addr,
        })
    }
}

/// Handle to the background listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    limiter: Arc<ConnectionLimiter>,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    /// Raises the stop flag seen by the accept loop and every session.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently admitted.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.limiter.active()
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the accept thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &Arc<AtomicBool>,
    handler: &Arc<dyn ConnectionHandler>,
    admission: &AdmissionPolicy,
) {
    info!(
        target: LISTENER_TARGET,
        address = %listener.local_addr,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                spawn_session(stream, shutdown, handler, admission);
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, "socket listener stopped");
}

fn spawn_session(
    stream: ConnectionStream,
    shutdown: &Arc<AtomicBool>,
    handler: &Arc<dyn ConnectionHandler>,
    admission: &AdmissionPolicy,
) {
    let peer = stream.peer();
    let permit = match admission.admit(peer) {
        Ok(permit) => permit,
        Err(denied) => {
            warn!(target: LISTENER_TARGET, %peer, reason = %denied, "connection refused");
            return;
        }
    };
    let handler = Arc::clone(handler);
    let stop = Arc::clone(shutdown);
    let spawned = thread::Builder::new()
        .name(format!("bridge-session-{peer}"))
        .spawn(move || {
            let _permit = permit;
            debug!(target: LISTENER_TARGET, %peer, "connection admitted");
            handler.handle(stream, &stop);
            debug!(target: LISTENER_TARGET, %peer, "connection closed");
        });
    if let Err(error) = spawned {
        warn!(target: LISTENER_TARGET, %peer, error = %error, "failed to spawn session thread");
    }
}

fn accept_connection(listener: &TcpListener) -> Result<Option<ConnectionStream>, io::Error> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(ConnectionStream::new(stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}
