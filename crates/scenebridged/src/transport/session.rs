//! Per-connection command loop.
//!
//! A session reads whatever bytes arrive, feeds them to a [`FrameDecoder`]
//! and answers every complete command before decoding the next, so responses
//! leave in request order. Reads wait at most the configured read timeout so
//! the stop flag is seen promptly.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use scenebridge_protocol::{Command, FrameDecoder};
use tracing::{debug, warn};

use crate::dispatch::{DispatchError, Dispatcher, ResponseWriter};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET};

const READ_CHUNK: usize = 8192;

/// Socket limits applied to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Ceiling on bytes buffered for a single message.
    pub max_message_bytes: usize,
    /// Bounded wait per read.
    pub read_timeout: Duration,
    /// Socket write timeout.
    pub write_timeout: Duration,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed its side.
    PeerClosed,
    /// The listener is shutting down.
    Shutdown,
    /// The client sent more than the message ceiling without completing a
    /// message.
    MessageTooLarge,
}

/// Connection handler running the decode, dispatch, reply cycle.
pub struct CommandSession {
    dispatcher: Arc<Dispatcher>,
    limits: SessionLimits,
}

impl CommandSession {
    /// Builds a handler sharing `dispatcher` across connections.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, limits: SessionLimits) -> Self {
        Self { dispatcher, limits }
    }

    fn run(&self, stream: &mut ConnectionStream, stop: &AtomicBool) -> Result<SessionEnd, DispatchError> {
        let mut decoder = FrameDecoder::new();
        let mut chunk = vec![0_u8; READ_CHUNK];
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(SessionEnd::Shutdown);
            }
            let read = match stream.read(&mut chunk) {
                Ok(0) => return Ok(SessionEnd::PeerClosed),
                Ok(read) => read,
                Err(error) if is_poll_timeout(&error) => continue,
                Err(error) => return Err(error.into()),
            };
            decoder.extend(chunk.get(..read).unwrap_or_default());

            if decoder.buffered_len() > self.limits.max_message_bytes {
                let error = DispatchError::MessageTooLarge {
                    size: decoder.buffered_len(),
                    max_size: self.limits.max_message_bytes,
                };
                warn!(
                    target: LISTENER_TARGET,
                    peer = %stream.peer(),
                    error = %error,
                    "closing connection"
                );
                ResponseWriter::new(&mut *stream).write_error(&error)?;
                return Ok(SessionEnd::MessageTooLarge);
            }

            self.answer_complete_frames(&mut decoder, stream, stop)?;
        }
    }

    fn answer_complete_frames(
        &self,
        decoder: &mut FrameDecoder,
        stream: &mut ConnectionStream,
        stop: &AtomicBool,
    ) -> Result<(), DispatchError> {
        loop {
            let response = match decoder.next_frame() {
                Ok(Some(value)) => match Command::from_value(value) {
                    Ok(command) => {
                        debug!(
                            target: LISTENER_TARGET,
                            peer = %stream.peer(),
                            command = %command.name(),
                            "command received"
                        );
                        self.dispatcher.execute(&command, stop)
                    }
                    Err(error) => DispatchError::invalid_command(error).to_response(),
                },
                Ok(None) => return Ok(()),
                Err(source) => {
                    let error = DispatchError::MalformedMessage { source };
                    debug!(
                        target: LISTENER_TARGET,
                        peer = %stream.peer(),
                        error = %error,
                        "discarding malformed input"
                    );
                    ResponseWriter::new(&mut *stream).write_error(&error)?;
                    return Ok(());
                }
            };
            ResponseWriter::new(&mut *stream).write_response(response)?;
        }
    }
}

impl ConnectionHandler for CommandSession {
    fn handle(&self, mut stream: ConnectionStream, stop: &AtomicBool) {
        let peer = stream.peer();
        if let Err(error) = stream.set_timeouts(self.limits.read_timeout, self.limits.write_timeout) {
            warn!(target: LISTENER_TARGET, %peer, error = %error, "failed to configure socket");
            return;
        }
        match self.run(&mut stream, stop) {
            Ok(end) => debug!(target: LISTENER_TARGET, %peer, ?end, "session ended"),
            Err(error) => warn!(target: LISTENER_TARGET, %peer, error = %error, "session failed"),
        }
    }
}

fn is_poll_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
