//! Periodic purge of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ResponseCache;

/// Spawn the sweeper on the current tokio runtime.
///
/// The first sweep runs one `interval` after spawning. The task exits as
/// soon as `shutdown` is cancelled, including mid-wait.
///
/// # Panics
///
/// Panics if called outside a tokio runtime. The gateway builder checks
/// for a runtime before calling this.
pub fn spawn_sweeper(
    cache: Arc<ResponseCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // `interval` yields immediately; the cache is empty at that point.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("cache sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        info!(removed, remaining = cache.len(), "swept expired cache entries");
                    } else {
                        debug!("cache sweep found nothing to remove");
                    }
                }
            }
        }
    })
}
