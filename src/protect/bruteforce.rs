//! Brute-force lockout guard for security-sensitive flows.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{GuardError, Result};
use crate::ratelimit::{CounterKey, CounterStore, Identifier, WindowDecision};

/// Attempt-based lockout guard layered on top of the generic rate limiter
/// for flows like login and OTP verification.
///
/// Attempts are tracked in a store of their own, so brute-force state for an
/// identifier can never be confused with, or reset through, that
/// identifier's generic rate-limit counters. Thresholds are supplied per
/// call rather than through the policy registry: each flow knows its own
/// `max_attempts` and `lockout`.
pub struct BruteForceGuard {
    attempts: CounterStore,
}

impl BruteForceGuard {
    /// Create a new guard with no tracked attempts.
    pub fn new() -> Self {
        Self {
            attempts: CounterStore::new(),
        }
    }

    /// Record one attempt for `(identifier, flow)` and report whether it is
    /// permitted.
    ///
    /// The `max_attempts`-th attempt within the window locks the key and
    /// returns `false`; every further attempt inside `lockout` also returns
    /// `false`. Once the lockout elapses the next attempt is permitted and
    /// the count restarts at 1.
    pub fn check(
        &self,
        identifier: &Identifier,
        flow: &str,
        max_attempts: u64,
        lockout: Duration,
    ) -> Result<bool> {
        if flow.is_empty() {
            warn!("Brute force check with empty flow key");
            return Err(GuardError::InvalidArgument(
                "flow key must not be empty".to_string(),
            ));
        }
        if max_attempts == 0 {
            warn!(flow = %flow, "Brute force check with zero max_attempts");
            return Err(GuardError::InvalidArgument(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let key = CounterKey::new(identifier, flow);
        trace!(key = %key, max_attempts = max_attempts, "Checking brute force guard");

        // The attempt that reaches max_attempts is the one that locks, so
        // the admission ceiling sits one below it.
        let decision = self
            .attempts
            .check_and_increment(key.clone(), max_attempts - 1, lockout);

        match decision {
            WindowDecision::Admitted { .. } => Ok(true),
            WindowDecision::Blocked { .. } => {
                debug!(key = %key, lockout_secs = lockout.as_secs(), "Brute force lockout active");
                Ok(false)
            }
        }
    }

    /// Forget all attempts for `(identifier, flow)`, e.g. after a successful
    /// login.
    pub fn reset(&self, identifier: &Identifier, flow: &str) {
        let key = CounterKey::new(identifier, flow);
        debug!(key = %key, "Resetting brute force attempts");
        self.attempts.remove(&key);
    }

    /// Number of keys currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.attempts.len()
    }

    /// Evict expired attempt entries. Called by the cleanup scheduler.
    pub(crate) fn sweep(&self) -> usize {
        self.attempts.sweep()
    }
}

impl Default for BruteForceGuard {
    fn default() -> Self {
        Self::new()
    }
}
