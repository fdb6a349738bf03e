//! Opguard - Operation-Scoped Rate Limiting and Abuse Protection
//!
//! This crate implements an in-process engine guarding sensitive and
//! high-volume operations (login, uploads, messaging, CRUD, search) against
//! excessive or malicious use: policy-driven fixed-window counters, a
//! brute-force lockout guard, an IP blacklist, periodic cleanup, and a
//! generic enforcement wrapper. It performs no I/O on the hot path; callers
//! hand it an operation key and an actor identifier and map the resulting
//! decision onto their own transport.

pub mod cleanup;
pub mod config;
pub mod enforce;
pub mod engine;
pub mod error;
pub mod protect;
pub mod ratelimit;

pub use cleanup::{CleanupHandle, CleanupScheduler};
pub use config::{EngineConfig, PolicyConfig};
pub use enforce::{Enforcer, Outcome};
pub use engine::Engine;
pub use error::{GuardError, Result};
pub use protect::{Blacklist, BruteForceGuard};
pub use ratelimit::{Decision, Denial, Identifier, Policy, PolicyRegistry, RateLimiter};
