//! Periodic background expiry sweep
//!
//! The engine already sweeps lazily at the start of every operation, so
//! staleness is bounded by the interval between calls. This task bounds it
//! by wall-clock time as well, reclaiming expired leases even when the pool
//! sits idle. It runs the same idempotent sweep as the request path.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::PoolEngine;
use crate::record::{AvailableEntry, LeaseEntry};
use crate::store::SetStore;

/// Spawn a task that runs the expiry sweep every `interval`.
///
/// Returns the `JoinHandle`; dropping it leaves the task running for the
/// life of the runtime.
pub fn spawn_sweep_task<A, L>(
    engine: Arc<PoolEngine<A, L>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    A: SetStore<AvailableEntry> + 'static,
    L: SetStore<LeaseEntry> + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; startup operations sweep anyway
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match engine.expire().await {
                Ok(0) => {}
                Ok(reclaimed) => {
                    info!(reclaimed, "background sweep reclaimed expired leases");
                }
                Err(e) => {
                    warn!(error = %e, "background sweep failed, will retry next interval");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FilePoolEngine;

    #[tokio::test]
    async fn background_sweep_reclaims_idle_expired_leases() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            FilePoolEngine::open(dir.path(), Duration::from_secs(0)).unwrap(),
        );

        engine.add("10.0.0.1", "a", "p").await.unwrap();
        engine.claim().await.unwrap();

        let task = spawn_sweep_task(engine.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        task.abort();

        // Reclaimed without any request-path operation running a sweep:
        // read the set files directly
        let in_use = tokio::fs::read_to_string(dir.path().join("in_use_rdp.txt"))
            .await
            .unwrap();
        assert!(in_use.trim().is_empty(), "in_use: {in_use:?}");
        let available = tokio::fs::read_to_string(dir.path().join("available_rdp.txt"))
            .await
            .unwrap();
        assert!(available.contains("10.0.0.1"));
    }
}
