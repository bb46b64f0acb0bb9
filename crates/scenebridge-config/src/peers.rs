//! Peer allow-list parsing and matching.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// Alias accepted in the allow-list for both loopback addresses.
pub const LOCALHOST_ALIAS: &str = "localhost";

/// Parsed set of peer addresses permitted to connect.
///
/// An empty list disables filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerAllowList {
    addresses: BTreeSet<IpAddr>,
}

/// Errors raised while parsing allow-list entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerAllowListError {
    /// An entry was neither an IP address nor `localhost`.
    #[error("invalid allow-list entry '{entry}': expected an IP address or 'localhost'")]
    InvalidEntry {
        /// Offending entry.
        entry: String,
    },
}

impl PeerAllowList {
    /// Allow-list that admits every peer.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses configured entries.
    ///
    /// # Errors
    ///
    /// Returns [`PeerAllowListError::InvalidEntry`] for the first entry that
    /// does not parse.
    pub fn parse<I, S>(entries: I) -> Result<Self, PeerAllowListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addresses = BTreeSet::new();
        for entry in entries {
            let trimmed = entry.as_ref().trim();
            if trimmed.eq_ignore_ascii_case(LOCALHOST_ALIAS) {
                addresses.insert(IpAddr::V4(Ipv4Addr::LOCALHOST));
                addresses.insert(IpAddr::V6(Ipv6Addr::LOCALHOST));
                continue;
            }
            let address = trimmed
                .parse::<IpAddr>()
                .map_err(|_| PeerAllowListError::InvalidEntry {
                    entry: trimmed.to_owned(),
                })?;
            addresses.insert(address.to_canonical());
        }
        Ok(Self { addresses })
    }

    /// Returns true when filtering is disabled.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Returns true when `peer` may connect.
    #[must_use]
    pub fn permits(&self, peer: IpAddr) -> bool {
        self.is_open() || self.addresses.contains(&peer.to_canonical())
    }
}
