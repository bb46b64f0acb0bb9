//! Admission policy applied to every accepted connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use scenebridge_config::PeerAllowList;
use thiserror::Error;

/// Reason a connection was refused. Refused peers receive no bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionDenied {
    /// The peer address is not on the allow-list.
    #[error("peer {peer} is not on the allow-list")]
    NotAllowed {
        /// Refused peer.
        peer: SocketAddr,
    },
    /// The concurrency ceiling was reached.
    #[error("peer {peer} refused: {limit} connections already active")]
    AtCapacity {
        /// Refused peer.
        peer: SocketAddr,
        /// Configured ceiling.
        limit: usize,
    },
}

/// Counts active connections against a ceiling.
#[derive(Debug)]
pub struct ConnectionLimiter {
    active: AtomicUsize,
    limit: usize,
}

impl ConnectionLimiter {
    /// Limiter admitting at most `limit` concurrent connections.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            limit,
        }
    }

    /// Connections currently holding a permit.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Configured ceiling.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < self.limit).then_some(active + 1)
            })
            .ok()
            .map(|_| ConnectionPermit {
                limiter: Arc::clone(self),
            })
    }
}

/// Slot held by an active connection; released on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limiter.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Allow-list plus concurrency ceiling.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    allow_list: PeerAllowList,
    limiter: Arc<ConnectionLimiter>,
}

impl AdmissionPolicy {
    /// Builds a policy from an allow-list and a connection ceiling.
    #[must_use]
    pub fn new(allow_list: PeerAllowList, max_connections: usize) -> Self {
        Self {
            allow_list,
            limiter: Arc::new(ConnectionLimiter::new(max_connections)),
        }
    }

    /// Shared connection counter.
    #[must_use]
    pub fn limiter(&self) -> Arc<ConnectionLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Decides whether `peer` may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionDenied`] when the peer is not allowed or the
    /// ceiling has been reached.
    pub fn admit(&self, peer: SocketAddr) -> Result<ConnectionPermit, AdmissionDenied> {
        if !self.allow_list.permits(peer.ip()) {
            return Err(AdmissionDenied::NotAllowed { peer });
        }
        self.limiter
            .try_acquire()
            .ok_or(AdmissionDenied::AtCapacity {
                peer,
                limit: self.limiter.limit,
            })
    }
}
