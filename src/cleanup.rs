//! Background eviction of expired engine state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::protect::{Blacklist, BruteForceGuard};
use crate::ratelimit::RateLimiter;

/// Periodic sweep that bounds memory by evicting expired counters, attempt
/// entries, and blacklist entries.
///
/// Purely housekeeping: the hot paths already treat stale entries as expired
/// on read, so a delayed sweep has no business consequence. Sweeps take the
/// same per-shard locks as the mutation paths, so a sweep never races a
/// concurrent increment on the same key.
pub struct CleanupScheduler;

impl CleanupScheduler {
    /// Spawn the sweep task on the current tokio runtime.
    pub fn spawn(
        interval: Duration,
        limiter: Arc<RateLimiter>,
        bruteforce: Arc<BruteForceGuard>,
        blacklist: Arc<Blacklist>,
    ) -> CleanupHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Cleanup scheduler started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // sweep happens one full interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep() + bruteforce.sweep() + blacklist.sweep();
                        if evicted > 0 {
                            debug!(evicted = evicted, "Cleanup sweep evicted expired entries");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Cleanup scheduler stopping");
                        break;
                    }
                }
            }
        });

        CleanupHandle { shutdown_tx, task }
    }
}

/// Handle to a running cleanup task.
pub struct CleanupHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }

    /// Abort the task without waiting.
    pub fn abort(&self) {
        self.task.abort();
    }
}
