//! Rate limiting logic and state management.

mod counter;
mod identity;
mod limiter;
mod policy;

pub use counter::{CounterEntry, CounterStore, WindowDecision};
pub use identity::{CounterKey, Identifier};
pub use limiter::{CounterStats, Decision, Denial, RateLimiter};
pub use policy::{Policy, PolicyRegistry};
