//! Abuse-protection guards layered on top of the rate limiter.

mod blacklist;
mod bruteforce;

pub use blacklist::Blacklist;
pub use bruteforce::BruteForceGuard;
