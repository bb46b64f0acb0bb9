//! Connection handler double for listener tests.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, PoisonError};

use super::{ConnectionHandler, ConnectionStream};

/// Remembers the peer of every connection it is handed, then hangs up.
#[derive(Debug, Default)]
pub(crate) struct PeerRecorder {
    peers: Mutex<Vec<SocketAddr>>,
}

impl PeerRecorder {
    pub(crate) fn peers(&self) -> Vec<SocketAddr> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn handled(&self) -> usize {
        self.peers().len()
    }
}

impl ConnectionHandler for PeerRecorder {
    fn handle(&self, stream: ConnectionStream, _stop: &AtomicBool) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stream.peer());
    }
}
