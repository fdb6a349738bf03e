//! Generic enforcement wrapper around guarded actions.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{trace, warn};

use crate::error::Result;
use crate::protect::{Blacklist, BruteForceGuard};
use crate::ratelimit::{Decision, Denial, Identifier, RateLimiter};

/// Denial message used for blacklisted addresses.
const BLACKLIST_MESSAGE: &str = "Access temporarily restricted.";

/// Outcome of running a guarded action.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The action ran; its output is passed through unchanged
    Executed(T),
    /// The action was skipped because the request was denied
    Rejected(Denial),
}

impl<T> Outcome<T> {
    /// The action's output, if it ran.
    pub fn executed(self) -> Option<T> {
        match self {
            Outcome::Executed(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    /// Whether the action was skipped.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

/// Guards arbitrary actions behind the blacklist and the rate limiter.
///
/// Usable two ways with identical semantics: [`Enforcer::check`] as a
/// decision point inside request-pipeline middleware, and
/// [`Enforcer::enforce`] as a plain wrapper around a service call. Both
/// consult the blacklist first (fast reject) and the rate limiter second.
#[derive(Clone)]
pub struct Enforcer {
    limiter: Arc<RateLimiter>,
    bruteforce: Arc<BruteForceGuard>,
    blacklist: Arc<Blacklist>,
}

impl Enforcer {
    /// Create an enforcer over shared engine components.
    pub fn new(
        limiter: Arc<RateLimiter>,
        bruteforce: Arc<BruteForceGuard>,
        blacklist: Arc<Blacklist>,
    ) -> Self {
        Self {
            limiter,
            bruteforce,
            blacklist,
        }
    }

    /// Decide whether a request by `identifier` may perform `operation`,
    /// recording it against the operation's policy.
    pub fn check(&self, operation: &str, identifier: &Identifier) -> Result<Decision> {
        if let Some(ip) = identifier.ip() {
            if self.blacklist.is_blacklisted(ip) {
                warn!(ip = %ip, operation = %operation, "Rejecting blacklisted address");
                // Surface the entry's actual expiry; if it raced its own
                // expiry we are no longer blacklisted and fall through.
                if let Some(remaining) = self.blacklist.expires_in(ip) {
                    return Ok(Decision::Denied(Denial::new(
                        BLACKLIST_MESSAGE,
                        Instant::now() + remaining,
                    )));
                }
            }
        }
        self.limiter.check(identifier, operation)
    }

    /// Run `action` if `identifier` is within its limits for `operation`,
    /// otherwise skip it and return the denial.
    ///
    /// The action's output is returned unchanged, so a fallible action keeps
    /// its own `Result` inside [`Outcome::Executed`].
    pub async fn enforce<F, Fut, T>(
        &self,
        operation: &str,
        identifier: &Identifier,
        action: F,
    ) -> Result<Outcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.check(operation, identifier)? {
            Decision::Allowed => {
                trace!(operation = %operation, "Request admitted, running action");
                Ok(Outcome::Executed(action().await))
            }
            Decision::Denied(denial) => Ok(Outcome::Rejected(denial)),
        }
    }

    /// The rate limiter behind this enforcer.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The brute-force guard sharing this enforcer's state, for
    /// security-sensitive flows that track failed attempts themselves.
    pub fn bruteforce(&self) -> &BruteForceGuard {
        &self.bruteforce
    }

    /// The blacklist behind this enforcer.
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::Policy;
    use std::net::IpAddr;
    use std::time::Duration;

    fn enforcer() -> Enforcer {
        let limiter = Arc::new(RateLimiter::new());
        limiter
            .policies()
            .register(Policy::new("op", Duration::from_secs(60), 2, "limited"));
        Enforcer::new(
            limiter,
            Arc::new(BruteForceGuard::new()),
            Arc::new(Blacklist::new()),
        )
    }

    #[tokio::test]
    async fn test_action_runs_when_allowed() {
        let enforcer = enforcer();
        let id = Identifier::User("u1".to_string());

        let outcome = enforcer
            .enforce("op", &id, || async { 41 + 1 })
            .await
            .unwrap();
        assert_eq!(outcome.executed(), Some(42));
    }

    #[tokio::test]
    async fn test_action_skipped_when_denied() {
        let enforcer = enforcer();
        let id = Identifier::User("u1".to_string());

        enforcer.enforce("op", &id, || async {}).await.unwrap();
        enforcer.enforce("op", &id, || async {}).await.unwrap();

        let mut ran = false;
        let outcome = enforcer
            .enforce("op", &id, || {
                ran = true;
                async {}
            })
            .await
            .unwrap();

        assert!(outcome.is_rejected());
        assert!(!ran);
        match outcome {
            Outcome::Rejected(denial) => assert_eq!(denial.message, "limited"),
            Outcome::Executed(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_blacklisted_ip_short_circuits() {
        let enforcer = enforcer();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        enforcer.blacklist().add(ip, Duration::from_secs(60));

        let id = Identifier::Ip(ip);
        let outcome = enforcer.enforce("op", &id, || async {}).await.unwrap();

        assert!(outcome.is_rejected());
        match outcome {
            Outcome::Rejected(denial) => {
                assert_eq!(denial.message, BLACKLIST_MESSAGE);
                assert!(denial.retry_after <= Duration::from_secs(60));
            }
            Outcome::Executed(_) => unreachable!(),
        }
        // The blacklist rejection never touched the rate limit counter.
        assert!(enforcer.limiter().stats(&id, "op").is_none());
    }

    #[tokio::test]
    async fn test_non_ip_identifier_skips_blacklist() {
        let enforcer = enforcer();
        enforcer
            .blacklist()
            .add("10.0.0.1".parse().unwrap(), Duration::from_secs(60));

        let id = Identifier::User("u1".to_string());
        let outcome = enforcer.enforce("op", &id, || async {}).await.unwrap();
        assert!(!outcome.is_rejected());
    }

    #[tokio::test]
    async fn test_fallible_action_result_passes_through() {
        let enforcer = enforcer();
        let id = Identifier::User("u1".to_string());

        let outcome = enforcer
            .enforce("op", &id, || async { Err::<(), &str>("backend down") })
            .await
            .unwrap();
        assert_eq!(outcome.executed(), Some(Err("backend down")));
    }
}
