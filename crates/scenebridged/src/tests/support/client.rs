//! Minimal blocking protocol client for tests.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use scenebridge_protocol::FrameDecoder;
use serde_json::Value;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct TestClient {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl TestClient {
    pub(crate) fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to bridge");
        stream
            .set_read_timeout(Some(Duration::from_millis(50)))
            .expect("set read timeout");
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    pub(crate) fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("write to bridge");
        self.stream.flush().expect("flush");
    }

    pub(crate) fn send(&mut self, value: &Value) {
        let bytes = serde_json::to_vec(value).expect("serialise command");
        self.send_raw(&bytes);
    }

    pub(crate) fn request(&mut self, value: &Value) -> Value {
        self.send(value);
        self.read_response()
    }

    /// Reads one response, panicking if none arrives in time.
    pub(crate) fn read_response(&mut self) -> Value {
        self.try_read_response(RESPONSE_TIMEOUT)
            .expect("response before timeout")
    }

    /// Reads one response, or `None` on EOF or timeout.
    pub(crate) fn try_read_response(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0_u8; 4096];
        loop {
            if let Some(value) = self.decoder.next_frame().expect("well-formed response") {
                return Some(value);
            }
            if Instant::now() >= deadline {
                return None;
            }
            match self.stream.read(&mut chunk) {
                Ok(0) => return None,
                Ok(read) => self.decoder.extend(&chunk[..read]),
                Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(_) => return None,
            }
        }
    }

    /// Returns true once the bridge has closed the connection.
    pub(crate) fn closed_by_peer(&mut self) -> bool {
        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        let mut chunk = [0_u8; 64];
        while Instant::now() < deadline {
            match self.stream.read(&mut chunk) {
                Ok(0) => return true,
                Ok(_) => return false,
                Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(_) => return true,
            }
        }
        false
    }
}
