//! Fixed-window counter entries and the concurrent store that holds them.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::error;

use super::identity::CounterKey;

/// A single fixed-window counter.
///
/// `resets_at` is `creation + window` when the entry is created, and is
/// extended to `now + window` exactly once, at the transition into the
/// blocked state. A request observed at exactly `resets_at` is treated as
/// window-expired (non-inclusive boundary).
#[derive(Debug, Clone, Copy)]
pub struct CounterEntry {
    /// Requests observed in the current window
    pub count: u64,
    /// When the current window (or lockout) expires
    pub resets_at: Instant,
    /// Whether the ceiling has been crossed in this window
    pub blocked: bool,
}

impl CounterEntry {
    /// A fresh entry for the first request of a window. A ceiling of zero
    /// blocks even that first request.
    fn fresh(now: Instant, window: Duration, ceiling: u64) -> Self {
        Self {
            count: 1,
            resets_at: now + window,
            blocked: ceiling == 0,
        }
    }

    fn decision(&self) -> WindowDecision {
        if self.blocked {
            WindowDecision::Blocked {
                resets_at: self.resets_at,
            }
        } else {
            WindowDecision::Admitted {
                count: self.count,
                resets_at: self.resets_at,
            }
        }
    }

    /// Whether the entry's window has expired as of `now`.
    pub fn expired(&self, now: Instant) -> bool {
        now >= self.resets_at
    }
}

/// Outcome of a single atomic check-and-increment.
#[derive(Debug, Clone, Copy)]
pub enum WindowDecision {
    /// The request is within the ceiling
    Admitted {
        /// Count after this request, including it
        count: u64,
        /// When the current window expires
        resets_at: Instant,
    },
    /// The ceiling has been crossed; the key is blocked until `resets_at`
    Blocked {
        /// When the block lifts
        resets_at: Instant,
    },
}

/// Concurrent store of fixed-window counters, keyed by `(actor, operation)`.
///
/// The read-modify-write in `check_and_increment` executes under the shard
/// lock for the key, so two racing requests can never both observe
/// `count == ceiling` and both be admitted. Sweeps take the same shard
/// locks, so cleanup never races a concurrent mutation of the same key.
pub struct CounterStore {
    entries: DashMap<CounterKey, CounterEntry>,
}

impl CounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Atomically record one request against `key` and decide whether it is
    /// within the ceiling.
    ///
    /// `ceiling` is the maximum count that is still admitted; the increment
    /// that pushes the count past it flips the entry into the blocked state
    /// and extends `resets_at` by a full fresh `window` from now.
    pub fn check_and_increment(
        &self,
        key: CounterKey,
        ceiling: u64,
        window: Duration,
    ) -> WindowDecision {
        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Vacant(slot) => slot.insert(CounterEntry::fresh(now, window, ceiling)).decision(),
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.expired(now) {
                    *entry = CounterEntry::fresh(now, window, ceiling);
                    return entry.decision();
                }
                if entry.blocked {
                    return WindowDecision::Blocked {
                        resets_at: entry.resets_at,
                    };
                }
                let Some(count) = entry.count.checked_add(1) else {
                    // Counter overflow means the store invariants are gone.
                    // Fail open rather than turn the limiter into an outage.
                    let fallback = WindowDecision::Admitted {
                        count: entry.count,
                        resets_at: entry.resets_at,
                    };
                    error!("counter overflow, admitting request");
                    return fallback;
                };
                entry.count = count;
                if entry.count > ceiling {
                    entry.blocked = true;
                    entry.resets_at = now + window;
                    WindowDecision::Blocked {
                        resets_at: entry.resets_at,
                    }
                } else {
                    WindowDecision::Admitted {
                        count: entry.count,
                        resets_at: entry.resets_at,
                    }
                }
            }
        }
    }

    /// Unconditionally delete the counter for `key`.
    pub fn remove(&self, key: &CounterKey) {
        self.entries.remove(key);
    }

    /// Read-only snapshot of the counter for `key`, if one exists.
    pub fn snapshot(&self, key: &CounterKey) -> Option<CounterEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    /// Evict every entry whose window has expired. Returns the number of
    /// entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now));
        before - self.entries.len()
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}
