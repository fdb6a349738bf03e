//! Rate limit policies and the registry that maps operations to them.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

/// A rate limit policy for a single operation.
#[derive(Debug, Clone)]
pub struct Policy {
    /// The operation this policy applies to, e.g. `auth:login`
    pub operation: String,
    /// The fixed window over which requests are counted
    pub window: Duration,
    /// Maximum requests admitted within the window
    pub max_requests: u64,
    /// Human-readable denial message surfaced to callers
    pub message: String,
}

impl Policy {
    /// Create a new policy.
    pub fn new(
        operation: impl Into<String>,
        window: Duration,
        max_requests: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            window,
            max_requests,
            message: message.into(),
        }
    }

    /// The default policy table shipped with the engine. Values are
    /// configuration, not contract; deployments override them via
    /// `EngineConfig`.
    pub fn defaults() -> Vec<Policy> {
        const MINUTE: Duration = Duration::from_secs(60);
        vec![
            Policy::new(
                "auth:login",
                Duration::from_secs(15 * 60),
                5,
                "Too many login attempts. Please try again later.",
            ),
            Policy::new(
                "auth:register",
                Duration::from_secs(60 * 60),
                3,
                "Too many registration attempts. Please try again later.",
            ),
            Policy::new(
                "auth:reset-password",
                Duration::from_secs(15 * 60),
                3,
                "Too many password reset requests. Please try again later.",
            ),
            Policy::new(
                "upload:file",
                MINUTE,
                10,
                "Upload limit reached. Please slow down.",
            ),
            Policy::new(
                "message:send",
                MINUTE,
                30,
                "Message limit reached. Please slow down.",
            ),
            Policy::new(
                "crud:create",
                MINUTE,
                20,
                "Too many create requests. Please slow down.",
            ),
            Policy::new(
                "crud:delete",
                MINUTE,
                10,
                "Too many delete requests. Please slow down.",
            ),
            Policy::new(
                "search:general",
                MINUTE,
                100,
                "Search limit reached. Please slow down.",
            ),
        ]
    }
}

/// Registry mapping operation keys to policies.
///
/// An operation with no registered policy is always allowed: unconfigured
/// call sites never break, at the cost of requiring anything
/// security-sensitive to be registered explicitly.
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Policy>>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry seeded with the default policy table.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for policy in Policy::defaults() {
            registry.register(policy);
        }
        registry
    }

    /// Register a policy under its operation key. Idempotent; last write
    /// wins.
    pub fn register(&self, policy: Policy) {
        debug!(
            operation = %policy.operation,
            max_requests = policy.max_requests,
            window_secs = policy.window.as_secs(),
            "Registering rate limit policy"
        );
        let mut policies = self.policies.write();
        policies.insert(policy.operation.clone(), policy);
    }

    /// Look up the policy for an operation key.
    pub fn lookup(&self, operation: &str) -> Option<Policy> {
        let policies = self.policies.read();
        policies.get(operation).cloned()
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_missing_returns_none() {
        let registry = PolicyRegistry::new();
        assert!(registry.lookup("auth:login").is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PolicyRegistry::new();
        registry.register(Policy::new(
            "upload:file",
            Duration::from_secs(60),
            10,
            "slow down",
        ));

        let policy = registry.lookup("upload:file").unwrap();
        assert_eq!(policy.max_requests, 10);
        assert_eq!(policy.window, Duration::from_secs(60));
    }

    #[test]
    fn test_last_write_wins() {
        let registry = PolicyRegistry::new();
        registry.register(Policy::new("op", Duration::from_secs(60), 10, "a"));
        registry.register(Policy::new("op", Duration::from_secs(30), 5, "b"));

        let policy = registry.lookup("op").unwrap();
        assert_eq!(policy.max_requests, 5);
        assert_eq!(policy.message, "b");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_defaults_cover_sensitive_operations() {
        let registry = PolicyRegistry::with_defaults();
        for operation in ["auth:login", "auth:register", "upload:file", "search:general"] {
            assert!(registry.lookup(operation).is_some(), "{} missing", operation);
        }

        let login = registry.lookup("auth:login").unwrap();
        assert_eq!(login.max_requests, 5);
        assert_eq!(login.window, Duration::from_secs(900));
    }
}
