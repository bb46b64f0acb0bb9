//! Chunked upload sessions.
//!
//! Clients open a session with `chunked_upload_init`, append hex-encoded
//! chunks in order, then finalize to have the payload assembled and handed to
//! an [`UploadSink`]. Sessions expire a fixed time after they were opened,
//! whether or not chunks keep arriving.

mod sink;

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::periodic::{PeriodicError, PeriodicHandle, Tick};

pub use sink::{DirectorySink, DiscardSink, MemorySink, UploadSink};

pub(crate) const UPLOADS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::uploads");

/// Errors surfaced by upload operations.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No live session has this id.
    #[error("Unknown upload_id: {upload_id}")]
    Unknown {
        /// Requested id.
        upload_id: String,
    },
    /// The chunk was not valid hex.
    #[error("invalid chunk for upload {upload_id}: {source}")]
    InvalidChunk {
        /// Session the chunk was meant for.
        upload_id: String,
        /// Decoder failure.
        #[source]
        source: hex::FromHexError,
    },
    /// Appending the chunk would exceed the upload ceiling.
    #[error("upload {upload_id} would reach {size} bytes, exceeding the {max_size} byte limit")]
    TooLarge {
        /// Session id.
        upload_id: String,
        /// Size the upload would have reached.
        size: usize,
        /// Configured ceiling.
        max_size: usize,
    },
    /// The sink refused the payload.
    #[error("failed to store upload {upload_id}: {source}")]
    Sink {
        /// Session id.
        upload_id: String,
        /// Sink failure.
        #[source]
        source: io::Error,
    },
}

/// Bounds applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Lifetime measured from `init`.
    pub expiry: Duration,
    /// Ceiling on the assembled payload.
    pub max_bytes: usize,
}

#[derive(Debug)]
struct UploadSession {
    chunks: Vec<Vec<u8>>,
    received: usize,
    started_at: Instant,
}

impl UploadSession {
    fn expired(&self, now: Instant, expiry: Duration) -> bool {
        now.saturating_duration_since(self.started_at) > expiry
    }
}

/// Table of in-progress uploads.
pub struct UploadManager {
    sessions: Mutex<HashMap<String, UploadSession>>,
    limits: UploadLimits,
    sink: Arc<dyn UploadSink>,
}

impl UploadManager {
    /// Builds a manager delivering payloads to `sink`.
    pub fn new(limits: UploadLimits, sink: Arc<dyn UploadSink>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
            sink,
        }
    }

    /// Bounds applied to sessions.
    #[must_use]
    pub const fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Opens a session and returns its id. Expired sessions are reaped first.
    pub fn init(&self) -> String {
        self.reap_expired();
        let upload_id = Uuid::new_v4().to_string();
        self.lock().insert(
            upload_id.clone(),
            UploadSession {
                chunks: Vec::new(),
                received: 0,
                started_at: Instant::now(),
            },
        );
        debug!(target: UPLOADS_TARGET, upload_id = %upload_id, "upload session opened");
        upload_id
    }

    /// Decodes and appends a chunk, returning its decoded length.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Unknown`] for ids that are not live,
    /// [`UploadError::InvalidChunk`] when the hex does not decode, and
    /// [`UploadError::TooLarge`] when the ceiling would be crossed.
    pub fn append(&self, upload_id: &str, chunk_hex: &str) -> Result<usize, UploadError> {
        let mut sessions = self.lock();
        let session = self.live_session(&mut sessions, upload_id)?;
        let chunk = hex::decode(chunk_hex.trim()).map_err(|source| UploadError::InvalidChunk {
            upload_id: upload_id.to_owned(),
            source,
        })?;
        let size = session.received.saturating_add(chunk.len());
        if size > self.limits.max_bytes {
            return Err(UploadError::TooLarge {
                upload_id: upload_id.to_owned(),
                size,
                max_size: self.limits.max_bytes,
            });
        }
        let received = chunk.len();
        session.received = size;
        session.chunks.push(chunk);
        Ok(received)
    }

    /// Assembles the payload, hands it to the sink and closes the session.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Unknown`] for ids that are not live and
    /// [`UploadError::Sink`] when the sink fails. The session is removed in
    /// both cases once it has been found.
    pub fn finalize(&self, upload_id: &str) -> Result<usize, UploadError> {
        let session = {
            let mut sessions = self.lock();
            self.live_session(&mut sessions, upload_id)?;
            sessions.remove(upload_id)
        };
        let Some(session) = session else {
            return Err(unknown(upload_id));
        };
        let payload = session.chunks.concat();
        let size = payload.len();
        self.sink
            .accept(upload_id, payload)
            .map_err(|source| UploadError::Sink {
                upload_id: upload_id.to_owned(),
                source,
            })?;
        debug!(target: UPLOADS_TARGET, upload_id, size, "upload finalized");
        Ok(size)
    }

    /// Drops every session older than the expiry. Returns how many went.
    pub fn reap_expired(&self) -> usize {
        self.reap_expired_at(Instant::now())
    }

    fn reap_expired_at(&self, now: Instant) -> usize {
        let expiry = self.limits.expiry;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|upload_id, session| {
            let keep = !session.expired(now, expiry);
            if !keep {
                debug!(target: UPLOADS_TARGET, upload_id = %upload_id, "upload session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.lock().len()
    }

    fn live_session<'a>(
        &self,
        sessions: &'a mut HashMap<String, UploadSession>,
        upload_id: &str,
    ) -> Result<&'a mut UploadSession, UploadError> {
        let expired = match sessions.get(upload_id) {
            Some(session) => session.expired(Instant::now(), self.limits.expiry),
            None => return Err(unknown(upload_id)),
        };
        if expired {
            sessions.remove(upload_id);
            debug!(target: UPLOADS_TARGET, upload_id, "upload session expired");
            return Err(unknown(upload_id));
        }
        sessions.get_mut(upload_id).ok_or_else(|| unknown(upload_id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UploadSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unknown(upload_id: &str) -> UploadError {
    UploadError::Unknown {
        upload_id: upload_id.to_owned(),
    }
}

/// Starts the thread that reaps expired sessions every `interval`.
///
/// # Errors
///
/// Returns [`PeriodicError::Spawn`] when the thread cannot be created.
pub fn spawn_reaper(
    manager: Arc<UploadManager>,
    interval: Duration,
) -> Result<PeriodicHandle, PeriodicError> {
    PeriodicHandle::spawn("upload-reaper", interval, move || {
        manager.reap_expired();
        Tick::Idle
    })
}
