//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::MIN_TICK;
use crate::cache::CacheStore;
use crate::events::{EventSink, ResilienceEvent};

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task sleeps for `sweep_interval` between runs and takes the write lock
/// only for the duration of one sweep. It exits on its own once the store has
/// been dropped; the owning [`Cache`](crate::cache::Cache) also aborts it on
/// shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(CacheStore::<String>::new(1000, 300)));
/// let handle = spawn_cleanup_task(Arc::downgrade(&store), Duration::from_secs(1), tracing_sink());
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(
    store: Weak<RwLock<CacheStore<V>>>,
    sweep_interval: Duration,
    events: Arc<dyn EventSink>,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let interval = sweep_interval.max(MIN_TICK);

    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting cache sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("Cache store dropped, stopping sweep task");
                break;
            };

            let removed = store.write().await.cleanup_expired();

            if removed > 0 {
                events.emit(&ResilienceEvent::CacheSweep { removed });
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}
