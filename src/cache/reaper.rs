//! Background TTL reaper for cache stores.
//!
//! Expiry is enforced lazily on read, but an idle user generates no reads,
//! so their entries would outlive the TTL indefinitely. The reaper sweeps
//! on a fixed interval independent of request traffic. Each sweep only
//! takes the per-shard locks `retain` needs, so in-flight `get_or_compute`
//! calls for unrelated keys are never blocked for the duration of a sweep.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::CacheStore;

/// Handle to a running reaper task; aborts the task when dropped.
#[derive(Debug)]
pub struct ReaperHandle {
    handle: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper immediately.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<T> CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn a periodic sweep removing expired entries from this store.
    ///
    /// Must be called from within a tokio runtime. The returned handle owns
    /// the task; dropping it stops the sweeps.
    #[must_use]
    pub fn spawn_reaper(&self, every: Duration) -> ReaperHandle {
        let store = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so a fresh store is not
            // swept before it holds anything.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "reaped expired cache entries");
                }
            }
        });
        ReaperHandle {
            handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::CacheKey;
    use super::*;
    use crate::core::{ResourceId, UserId};
    use crate::fingerprint::Fingerprint;

    fn key(resource: &str) -> CacheKey {
        CacheKey {
            user_id: UserId::from("u1"),
            resource_id: ResourceId::from(resource),
            fingerprint: Fingerprint::of_set(&[]),
        }
    }

    #[tokio::test]
    async fn reaper_sweeps_expired_entries() {
        let store: CacheStore<u64> = CacheStore::new("test", Duration::from_millis(30));
        let _reaper = store.spawn_reaper(Duration::from_millis(25));

        store.get_or_compute(key("a"), || async { Ok(1) }).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.is_empty());
        assert!(store.stats().reaped >= 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_reaper() {
        let store: CacheStore<u64> = CacheStore::new("test", Duration::from_millis(10));
        let reaper = store.spawn_reaper(Duration::from_millis(10));
        drop(reaper);

        store.get_or_compute(key("a"), || async { Ok(1) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        // TTL has long passed but nothing swept the entry.
        assert_eq!(store.len(), 1);
    }
}
