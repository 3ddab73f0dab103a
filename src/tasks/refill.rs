//! Token Bucket Refill Task
//!
//! Background task that periodically refills a token bucket and drains its
//! wait queue, so queued callers make progress even when no new call arrives.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::MIN_TICK;
use crate::limiter::TokenBucket;

/// Spawns the refill loop for `bucket`, ticking every `period`.
///
/// The loop ends when the bucket is dropped. The bucket keeps the returned
/// handle and aborts it on shutdown.
pub fn spawn_refill_task(bucket: Weak<TokenBucket>, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_TICK);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;

            let Some(bucket) = bucket.upgrade() else {
                debug!("Token bucket dropped, stopping refill task");
                break;
            };

            let drained = bucket.refill_if_due();
            trace!(limiter = %bucket.name(), drained, "Refill tick");
        }
    })
}
