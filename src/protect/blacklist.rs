//! IP deny-list with time-based expiry.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info};

/// An IP-keyed deny-list whose entries expire on their own.
///
/// Membership checks are O(1) and expire lazily: a stale entry is removed
/// the moment a lookup observes it, so `is_blacklisted` never reports `true`
/// past an entry's expiry. The cleanup scheduler additionally sweeps
/// entries that are never looked up again.
pub struct Blacklist {
    entries: DashMap<IpAddr, Instant>,
}

impl Blacklist {
    /// Create an empty blacklist.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Whether `ip` is currently blacklisted.
    pub fn is_blacklisted(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        // Copy the expiry out so the read guard is released before any
        // removal takes the shard's write lock.
        match self.entries.get(&ip).map(|expires_at| *expires_at) {
            Some(expires_at) if now < expires_at => true,
            Some(_) => {
                self.entries.remove_if(&ip, |_, expires_at| now >= *expires_at);
                false
            }
            None => false,
        }
    }

    /// Blacklist `ip` for `duration` from now, overwriting any existing
    /// entry.
    pub fn add(&self, ip: IpAddr, duration: Duration) {
        info!(ip = %ip, duration_secs = duration.as_secs(), "Blacklisting IP");
        self.entries.insert(ip, Instant::now() + duration);
    }

    /// Administrative unban: remove `ip` regardless of expiry.
    pub fn remove(&self, ip: IpAddr) {
        debug!(ip = %ip, "Removing IP from blacklist");
        self.entries.remove(&ip);
    }

    /// How long until `ip`'s entry expires, if it is currently blacklisted.
    pub fn expires_in(&self, ip: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(&ip)
            .and_then(|expires_at| expires_at.checked_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }

    /// Number of entries, including any not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the blacklist holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict expired entries. Called by the cleanup scheduler.
    pub(crate) fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| now < *expires_at);
        before - self.entries.len()
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::new()
    }
}
