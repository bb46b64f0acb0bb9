//! Blocking protocol client.
//!
//! [`BridgeClient`] holds at most one connection. It dials lazily, retrying
//! with exponential backoff, and drops the connection after any transport
//! failure so the next command starts from a fresh socket.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use scenebridge_config::{DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT};
use scenebridge_protocol::{Command, FrameDecoder, Params, Response, reserved};
use serde_json::{Value, json};

use crate::errors::ClientError;

const READ_CHUNK: usize = 8192;

/// Default number of connection attempts.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
/// Delay before the second attempt; doubles for each one after.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// How long to wait for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
/// Per-attempt TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Raw bytes carried by each upload chunk before hex encoding.
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Exponential reconnect schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    /// Schedule starting at `base`.
    #[must_use]
    pub const fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay after the zero-based failed `attempt`.
    #[must_use]
    pub fn delay(self, attempt: u32) -> Duration {
        self.base.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Where and how patiently to reach the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bridge host.
    pub host: String,
    /// Bridge port.
    pub port: u16,
    /// Connection attempts before giving up; zero is treated as one.
    pub attempts: u32,
    /// Reconnect schedule.
    pub backoff: Backoff,
    /// Deadline for each response.
    pub response_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_LISTEN_HOST.to_owned(),
            port: DEFAULT_LISTEN_PORT,
            attempts: DEFAULT_CONNECT_ATTEMPTS,
            backoff: Backoff::new(DEFAULT_RETRY_DELAY),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl ClientOptions {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome of a completed chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Session id assigned by the bridge.
    pub upload_id: String,
    /// Assembled size reported on finalize.
    pub size: u64,
}

struct Connection {
    stream: TcpStream,
    decoder: FrameDecoder,
}

/// Client speaking the bridge protocol over one TCP connection.
pub struct BridgeClient {
    options: ClientOptions,
    connection: Option<Connection>,
}

impl BridgeClient {
    /// Builds a disconnected client.
    #[must_use]
    pub const fn new(options: ClientOptions) -> Self {
        Self {
            options,
            connection: None,
        }
    }

    /// Options in force.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns true while a connection is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Connects if not already connected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resolve`] or, once every attempt has failed,
    /// [`ClientError::Connect`].
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.connection.is_none() {
            let stream = self.dial()?;
            self.connection = Some(Connection {
                stream,
                decoder: FrameDecoder::new(),
            });
        }
        Ok(())
    }

    /// Drops the connection, if any.
    pub fn disconnect(&mut self) {
        self.connection = None;
    }

    fn dial(&self) -> Result<TcpStream, ClientError> {
        let endpoint = self.options.endpoint();
        let address = resolve(&self.options.host, self.options.port).map_err(|source| {
            ClientError::Resolve {
                endpoint: endpoint.clone(),
                source,
            }
        })?;
        let attempts = self.options.attempts.max(1);
        let mut attempt = 0;
        loop {
            match TcpStream::connect_timeout(&address, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(source) if attempt + 1 >= attempts => {
                    return Err(ClientError::Connect {
                        endpoint,
                        attempts,
                        source,
                    });
                }
                Err(_) => {
                    thread::sleep(self.options.backoff.delay(attempt));
                    attempt += 1;
                }
            }
        }
    }

    /// Sends `command` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the bridge cannot be reached or the
    /// exchange fails; the connection is dropped after a transport failure.
    pub fn send(&mut self, command: &Command) -> Result<Response, ClientError> {
        self.connect()?;
        let timeout = self.options.response_timeout;
        let Some(connection) = self.connection.as_mut() else {
            return Err(ClientError::Closed);
        };
        let result = connection.exchange(command, timeout);
        if result.as_ref().is_err_and(ClientError::is_transport) {
            self.disconnect();
        }
        result
    }

    /// Sends a command with the given name and parameters.
    ///
    /// # Errors
    ///
    /// See [`BridgeClient::send`].
    pub fn request(&mut self, kind: &str, params: Params) -> Result<Response, ClientError> {
        self.send(&Command::new(kind, params))
    }

    /// Streams `payload` through the chunked upload commands.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] when the bridge refuses a step.
    pub fn upload(
        &mut self,
        payload: &[u8],
        chunk_bytes: usize,
    ) -> Result<UploadReceipt, ClientError> {
        let init = self.expect_ok(reserved::UPLOAD_INIT, Params::new())?;
        let upload_id = init
            .get("upload_id")
            .and_then(Value::as_str)
            .ok_or_else(|| rejected(reserved::UPLOAD_INIT, "response carried no upload_id"))?
            .to_owned();

        for chunk in payload.chunks(chunk_bytes.max(1)) {
            self.expect_ok(
                reserved::UPLOAD_CHUNK,
                params(json!({ "upload_id": upload_id, "chunk": hex::encode(chunk) })),
            )?;
        }

        let finalized = self.expect_ok(
            reserved::UPLOAD_FINALIZE,
            params(json!({ "upload_id": upload_id })),
        )?;
        let size = finalized
            .get("size")
            .and_then(Value::as_u64)
            .ok_or_else(|| rejected(reserved::UPLOAD_FINALIZE, "response carried no size"))?;
        Ok(UploadReceipt { upload_id, size })
    }

    fn expect_ok(&mut self, kind: &str, params: Params) -> Result<Value, ClientError> {
        match self.request(kind, params)? {
            Response::Ok { result, .. } => Ok(result),
            Response::Error { message, .. } => Err(rejected(kind, message)),
        }
    }
}

impl Connection {
    fn exchange(&mut self, command: &Command, timeout: Duration) -> Result<Response, ClientError> {
        let bytes = serde_json::to_vec(command).map_err(ClientError::Serialise)?;
        self.stream.write_all(&bytes).map_err(ClientError::Send)?;
        self.stream.flush().map_err(ClientError::Send)?;

        let value = self.read_value(timeout)?;
        serde_json::from_value(value).map_err(ClientError::Unexpected)
    }

    fn read_value(&mut self, timeout: Duration) -> Result<Value, ClientError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = vec![0_u8; READ_CHUNK];
        loop {
            if let Some(value) = self.decoder.next_frame().map_err(ClientError::Malformed)? {
                return Ok(value);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout { timeout });
            }
            self.stream
                .set_read_timeout(Some(remaining))
                .map_err(ClientError::Read)?;
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(ClientError::Closed),
                Ok(read) => self.decoder.extend(chunk.get(..read).unwrap_or_default()),
                Err(error) if is_timeout(&error) => {}
                Err(error) => return Err(ClientError::Read(error)),
            }
        }
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

fn rejected(command: &str, message: impl Into<String>) -> ClientError {
    ClientError::Rejected {
        command: command.to_owned(),
        message: message.into(),
    }
}
