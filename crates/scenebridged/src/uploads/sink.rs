//! Destinations for finalized upload payloads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use super::UPLOADS_TARGET;

/// Receives the assembled bytes of a finalized upload.
pub trait UploadSink: Send + Sync {
    /// Accepts the payload for `upload_id`.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the payload cannot be stored.
    fn accept(&self, upload_id: &str, payload: Vec<u8>) -> io::Result<()>;
}

/// Sink that records the payload size and drops the bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl UploadSink for DiscardSink {
    fn accept(&self, upload_id: &str, payload: Vec<u8>) -> io::Result<()> {
        debug!(
            target: UPLOADS_TARGET,
            upload_id,
            size = payload.len(),
            "upload finalized with no storage configured"
        );
        Ok(())
    }
}

/// Sink writing each payload to `<dir>/<upload_id>.bin`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Uses `dir`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory receiving payloads.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a payload for `upload_id` is written to.
    #[must_use]
    pub fn path_for(&self, upload_id: &str) -> PathBuf {
        self.dir.join(format!("{upload_id}.bin"))
    }
}

impl UploadSink for DirectorySink {
    fn accept(&self, upload_id: &str, payload: Vec<u8>) -> io::Result<()> {
        let path = self.path_for(upload_id);
        fs::write(&path, &payload)?;
        info!(
            target: UPLOADS_TARGET,
            upload_id,
            size = payload.len(),
            path = %path.display(),
            "upload stored"
        );
        Ok(())
    }
}

/// Sink keeping payloads in memory, for embedders and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    payloads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    /// Empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload stored for `upload_id`, if any.
    #[must_use]
    pub fn payload(&self, upload_id: &str) -> Option<Vec<u8>> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(id, _)| id == upload_id)
            .map(|(_, bytes)| bytes.clone())
    }

    /// Number of payloads received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when nothing has been received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UploadSink for MemorySink {
    fn accept(&self, upload_id: &str, payload: Vec<u8>) -> io::Result<()> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((upload_id.to_owned(), payload));
        Ok(())
    }
}
