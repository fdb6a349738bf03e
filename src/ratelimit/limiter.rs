//! Core rate limiter implementation.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::error::{GuardError, Result};

use super::counter::{CounterStore, WindowDecision};
use super::identity::{CounterKey, Identifier};
use super::policy::{Policy, PolicyRegistry};

/// A structured denial: everything a caller needs to answer the request
/// without the engine knowing anything about the transport.
#[derive(Debug, Clone)]
pub struct Denial {
    /// Human-readable message from the matched policy
    pub message: String,
    /// How long until a retry is permitted
    pub retry_after: Duration,
    /// Absolute wall-clock time after which a retry is permitted
    pub reset_at: DateTime<Utc>,
}

impl Denial {
    pub(crate) fn new(message: impl Into<String>, resets_at: Instant) -> Self {
        let retry_after = resets_at.saturating_duration_since(Instant::now());
        let reset_at = Utc::now()
            + chrono::Duration::from_std(retry_after).unwrap_or(chrono::Duration::zero());
        Self {
            message: message.into(),
            retry_after,
            reset_at,
        }
    }
}

/// The outcome of a rate limit check.
#[derive(Debug, Clone)]
pub enum Decision {
    /// The request is within its limit (or no policy applies)
    Allowed,
    /// The request exceeded its limit
    Denied(Denial),
}

impl Decision {
    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Read-only snapshot of a single counter, for administrative inspection.
#[derive(Debug, Clone)]
pub struct CounterStats {
    /// Requests observed in the current window
    pub count: u64,
    /// Requests still admitted before the ceiling, zero once blocked
    pub remaining: u64,
    /// Time until the window (or lockout) expires
    pub resets_in: Duration,
    /// Whether the key is currently blocked
    pub blocked: bool,
}

/// The core rate limiter: policy lookup plus fixed-window counting.
///
/// Thread-safe and shared across tasks behind an `Arc`. The check itself is
/// non-blocking and I/O-free, so it is safe to call synchronously on every
/// guarded request.
pub struct RateLimiter {
    policies: PolicyRegistry,
    counters: CounterStore,
}

impl RateLimiter {
    /// Create a rate limiter with an empty policy registry.
    pub fn new() -> Self {
        Self {
            policies: PolicyRegistry::new(),
            counters: CounterStore::new(),
        }
    }

    /// Create a rate limiter backed by an existing registry.
    pub fn with_registry(policies: PolicyRegistry) -> Self {
        Self {
            policies,
            counters: CounterStore::new(),
        }
    }

    /// The policy registry backing this limiter.
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// Check the rate limit for one request by `identifier` against
    /// `operation`, recording the request.
    ///
    /// Operations without a registered policy are always allowed. An empty
    /// operation key or identifier payload is a caller bug and returns
    /// `GuardError::InvalidArgument`.
    pub fn check(&self, identifier: &Identifier, operation: &str) -> Result<Decision> {
        let policy = match self.resolve_policy(identifier, operation)? {
            Some(policy) => policy,
            None => {
                trace!(operation = %operation, "No policy registered, allowing");
                return Ok(Decision::Allowed);
            }
        };

        let key = CounterKey::new(identifier, operation);
        trace!(key = %key, "Checking rate limit");

        let decision =
            self.counters
                .check_and_increment(key.clone(), policy.max_requests, policy.window);

        match decision {
            WindowDecision::Admitted { count, .. } => {
                if count == 1 {
                    debug!(
                        key = %key,
                        max_requests = policy.max_requests,
                        window_secs = policy.window.as_secs(),
                        "Starting new rate limit window"
                    );
                }
                Ok(Decision::Allowed)
            }
            WindowDecision::Blocked { resets_at } => {
                debug!(key = %key, "Rate limit exceeded");
                Ok(Decision::Denied(Denial::new(policy.message, resets_at)))
            }
        }
    }

    /// Administrative override: unconditionally forget all counter state for
    /// `(identifier, operation)`, lifting any block.
    pub fn reset(&self, identifier: &Identifier, operation: &str) -> Result<()> {
        self.validate(identifier, operation)?;
        let key = CounterKey::new(identifier, operation);
        debug!(key = %key, "Resetting rate limit counter");
        self.counters.remove(&key);
        Ok(())
    }

    /// Read-only snapshot of the current counter for `(identifier,
    /// operation)`, or `None` if no counter exists.
    pub fn stats(&self, identifier: &Identifier, operation: &str) -> Option<CounterStats> {
        let key = CounterKey::new(identifier, operation);
        let entry = self.counters.snapshot(&key)?;
        let max_requests = self
            .policies
            .lookup(operation)
            .map(|p| p.max_requests)
            .unwrap_or(0);
        Some(CounterStats {
            count: entry.count,
            remaining: if entry.blocked {
                0
            } else {
                max_requests.saturating_sub(entry.count)
            },
            resets_in: entry.resets_at.saturating_duration_since(Instant::now()),
            blocked: entry.blocked,
        })
    }

    /// Number of live counters.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Evict expired counters. Called by the cleanup scheduler.
    pub(crate) fn sweep(&self) -> usize {
        self.counters.sweep()
    }

    fn resolve_policy(&self, identifier: &Identifier, operation: &str) -> Result<Option<Policy>> {
        self.validate(identifier, operation)?;
        Ok(self.policies.lookup(operation))
    }

    fn validate(&self, identifier: &Identifier, operation: &str) -> Result<()> {
        if operation.is_empty() {
            warn!("Rate limit check with empty operation key");
            return Err(GuardError::InvalidArgument(
                "operation key must not be empty".to_string(),
            ));
        }
        if identifier.is_empty() {
            warn!(operation = %operation, "Rate limit check with empty identifier");
            return Err(GuardError::InvalidArgument(
                "identifier must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_with(operation: &str, window: Duration, max_requests: u64) -> RateLimiter {
        let limiter = RateLimiter::new();
        limiter
            .policies()
            .register(Policy::new(operation, window, max_requests, "denied"));
        limiter
    }

    fn user(id: &str) -> Identifier {
        Identifier::User(id.to_string())
    }

    #[test]
    fn test_no_policy_always_allows() {
        let limiter = RateLimiter::new();
        let id = user("u1");

        for _ in 0..100 {
            assert!(limiter.check(&id, "unregistered:op").unwrap().is_allowed());
        }
        assert_eq!(limiter.counter_count(), 0);
    }

    #[test]
    fn test_allows_up_to_max_then_denies() {
        let limiter = limiter_with("op", Duration::from_secs(60), 3);
        let id = user("u1");

        for _ in 0..3 {
            assert!(limiter.check(&id, "op").unwrap().is_allowed());
        }
        match limiter.check(&id, "op").unwrap() {
            Decision::Denied(denial) => {
                assert_eq!(denial.message, "denied");
                assert!(denial.retry_after > Duration::from_secs(55));
            }
            Decision::Allowed => panic!("fourth request admitted"),
        }
    }

    #[test]
    fn test_separate_identifiers_have_separate_counters() {
        let limiter = limiter_with("op", Duration::from_secs(60), 1);

        assert!(limiter.check(&user("a"), "op").unwrap().is_allowed());
        assert!(limiter.check(&user("b"), "op").unwrap().is_allowed());
        assert!(!limiter.check(&user("a"), "op").unwrap().is_allowed());
        assert_eq!(limiter.counter_count(), 2);
    }

    #[test]
    fn test_window_expiry_readmits_with_fresh_count() {
        let limiter = limiter_with("op", Duration::from_millis(40), 2);
        let id = user("u1");

        limiter.check(&id, "op").unwrap();
        limiter.check(&id, "op").unwrap();
        assert!(!limiter.check(&id, "op").unwrap().is_allowed());

        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.check(&id, "op").unwrap().is_allowed());
        let stats = limiter.stats(&id, "op").unwrap();
        assert_eq!(stats.count, 1);
        assert!(!stats.blocked);
    }

    #[test]
    fn test_reset_readmits_immediately() {
        let limiter = limiter_with("op", Duration::from_secs(60), 1);
        let id = user("u1");

        limiter.check(&id, "op").unwrap();
        assert!(!limiter.check(&id, "op").unwrap().is_allowed());

        limiter.reset(&id, "op").unwrap();
        assert!(limiter.check(&id, "op").unwrap().is_allowed());
    }

    #[test]
    fn test_stats_snapshot() {
        let limiter = limiter_with("op", Duration::from_secs(60), 5);
        let id = user("u1");

        assert!(limiter.stats(&id, "op").is_none());

        limiter.check(&id, "op").unwrap();
        limiter.check(&id, "op").unwrap();
        let stats = limiter.stats(&id, "op").unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.remaining, 3);
        assert!(!stats.blocked);
        assert!(stats.resets_in <= Duration::from_secs(60));
    }

    #[test]
    fn test_empty_operation_is_hard_error() {
        let limiter = RateLimiter::new();
        let err = limiter.check(&user("u1"), "").unwrap_err();
        assert!(matches!(err, GuardError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_identifier_is_hard_error() {
        let limiter = limiter_with("op", Duration::from_secs(60), 1);
        let err = limiter.check(&user(""), "op").unwrap_err();
        assert!(matches!(err, GuardError::InvalidArgument(_)));
    }

    #[test]
    fn test_worked_example_in_milliseconds() {
        // policy {window=60ms, max=3}: four quick requests give three
        // Allowed then one Denied; after the window a fresh one is Allowed.
        let limiter = limiter_with("op", Duration::from_millis(60), 3);
        let id = user("u1");

        for _ in 0..3 {
            assert!(limiter.check(&id, "op").unwrap().is_allowed());
        }
        assert!(!limiter.check(&id, "op").unwrap().is_allowed());

        std::thread::sleep(Duration::from_millis(70));
        assert!(limiter.check(&id, "op").unwrap().is_allowed());
        assert_eq!(limiter.stats(&id, "op").unwrap().count, 1);
    }

    #[test]
    fn test_concurrent_checks_admit_exactly_max() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter_with("op", Duration::from_secs(60), 10));

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    limiter
                        .check(&user("u1"), "op")
                        .map(|d| d.is_allowed())
                        .unwrap_or(false)
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|&admitted| admitted)
            .count();
        assert_eq!(admitted, 10);
    }
}
