//! Engine assembly: explicit construction of the shared guard state.
//!
//! The engine is built once at process start and passed by shared reference
//! to every call site, preserving single-instance semantics without hidden
//! global state.

use std::sync::Arc;

use tracing::info;

use crate::cleanup::{CleanupHandle, CleanupScheduler};
use crate::config::EngineConfig;
use crate::enforce::Enforcer;
use crate::protect::{Blacklist, BruteForceGuard};
use crate::ratelimit::{PolicyRegistry, RateLimiter};

/// The assembled abuse-protection engine.
pub struct Engine {
    config: EngineConfig,
    limiter: Arc<RateLimiter>,
    bruteforce: Arc<BruteForceGuard>,
    blacklist: Arc<Blacklist>,
}

impl Engine {
    /// Build an engine from configuration.
    ///
    /// The registry is seeded with the default policy table unless disabled,
    /// then configured policies are merged over it (last write wins).
    pub fn new(config: EngineConfig) -> Self {
        let registry = if config.use_default_policies {
            PolicyRegistry::with_defaults()
        } else {
            PolicyRegistry::new()
        };
        for policy_config in &config.policies {
            registry.register(policy_config.clone().into());
        }
        info!(policies = registry.len(), "Engine initialized");

        Self {
            config,
            limiter: Arc::new(RateLimiter::with_registry(registry)),
            bruteforce: Arc::new(BruteForceGuard::new()),
            blacklist: Arc::new(Blacklist::new()),
        }
    }

    /// An enforcer sharing this engine's state. Cheap to clone per call
    /// site.
    pub fn enforcer(&self) -> Enforcer {
        Enforcer::new(
            Arc::clone(&self.limiter),
            Arc::clone(&self.bruteforce),
            Arc::clone(&self.blacklist),
        )
    }

    /// Spawn the cleanup scheduler on the current tokio runtime.
    pub fn start_cleanup(&self) -> CleanupHandle {
        CleanupScheduler::spawn(
            self.config.cleanup_interval(),
            Arc::clone(&self.limiter),
            Arc::clone(&self.bruteforce),
            Arc::clone(&self.blacklist),
        )
    }

    /// The shared rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The shared brute-force guard.
    pub fn bruteforce(&self) -> &BruteForceGuard {
        &self.bruteforce
    }

    /// The shared blacklist.
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
