//! Background eviction loop.
//!
//! The reaper wakes on a fixed interval and asks the store to apply due
//! evictions. Retention is decided by the store's clock, not by the
//! interval, so the interval only bounds how late an expired task lingers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::TaskStore;

/// Spawns the reaper on the current tokio runtime.
///
/// The loop exits when `shutdown` is cancelled.
pub fn spawn_reaper(
    store: Arc<dyn TaskStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = store.run_pending_evictions().await {
                        tracing::warn!(error = %e, "eviction pass failed");
                    }
                }
            }
        }
    })
}
