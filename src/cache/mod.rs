//! Get-or-compute cache with per-key stampede protection and TTL expiry.
//!
//! [`CacheStore`] is a generic in-memory cache keyed by
//! `(user, resource, fingerprint)`. A hit on an unexpired entry returns the
//! stored payload without invoking the compute function. On a miss, at most
//! one computation per key runs at a time: the first caller claims the key
//! with a `Pending` state and spawns the computation, and every concurrent
//! caller for the same key awaits that in-flight result instead of
//! re-entering it.
//!
//! State machine per entry:
//!
//! ```text
//! Absent -> Pending -> Ready -> (Expired | Invalidated) -> Absent
//! ```
//!
//! Coordination uses `DashMap` for lock-free per-key access (no global lock
//! serializes unrelated users) and `tokio::sync::Notify` so waiters sleep
//! until the computation resolves instead of polling. The computation runs
//! on a spawned task, so a caller abandoning its request does not discard
//! the work: the result is still cached for the next caller. A failed
//! computation is propagated to every waiter and the key is released, so a
//! subsequent call retries rather than finding the key stuck in `Pending`.
//!
//! Expiry is measured from last write. The background reaper
//! ([`ReaperHandle`]) sweeps on its own interval because an idle user's
//! entries would otherwise linger past their TTL with no request traffic to
//! evict them.

pub mod reaper;

pub use reaper::ReaperHandle;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core::{DepctxError, ResourceId, UserId};
use crate::fingerprint::Fingerprint;

/// Cache key: one entry per user, resource, and resource-set version.
///
/// Because the fingerprint is part of the key, a user generating a new
/// resource automatically misses every old entry; explicit invalidation
/// exists to reclaim the orphaned memory, not for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Owner of the entry.
    pub user_id: UserId,
    /// The resource the cached computation was for.
    pub resource_id: ResourceId,
    /// Fingerprint of the user's resource set at compute time.
    pub fingerprint: Fingerprint,
}

/// A cached payload with its write timestamps.
///
/// Owned exclusively by [`CacheStore`]; `created_at` survives overwrites of
/// the same key while `updated_at` tracks the last write.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached computation result.
    pub payload: T,
    /// When this key was first computed.
    pub created_at: DateTime<Utc>,
    /// When this key was last written.
    pub updated_at: DateTime<Utc>,
    stored_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Shared state of one in-flight computation.
///
/// The slot is filled exactly once, before waiters are notified. Waiters
/// hold the `Arc` directly, so they receive the outcome even if the map
/// entry is invalidated while the computation runs.
struct InFlight<T> {
    notify: tokio::sync::Notify,
    slot: Mutex<Option<Result<T, DepctxError>>>,
}

impl<T: Clone> InFlight<T> {
    fn new() -> Self {
        Self {
            notify: tokio::sync::Notify::new(),
            slot: Mutex::new(None),
        }
    }

    fn peek(&self) -> Option<Result<T, DepctxError>> {
        self.slot.lock().ok().and_then(|guard| guard.clone())
    }

    fn complete(&self, result: Result<T, DepctxError>) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(result);
        }
        self.notify.notify_waiters();
    }
}

/// Per-key cache state.
enum EntryState<T> {
    /// A computation for this key is in flight; waiters await its handle.
    Pending(Arc<InFlight<T>>),
    /// The key holds a computed payload.
    Ready(CacheEntry<T>),
}

/// Hit/miss counters for one cache namespace.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    compute_failures: AtomicU64,
    invalidated: AtomicU64,
    reaped: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Requests answered from an unexpired entry.
    pub hits: u64,
    /// Requests that triggered or joined a computation.
    pub misses: u64,
    /// Computations that completed successfully.
    pub computations: u64,
    /// Computations that failed.
    pub compute_failures: u64,
    /// Entries removed by invalidation.
    pub invalidated: u64,
    /// Entries removed by the TTL reaper.
    pub reaped: u64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            compute_failures: self.compute_failures.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            reaped: self.reaped.load(Ordering::Relaxed),
        }
    }
}

/// Role a caller ends up with after the claim step.
enum Role {
    /// This caller claimed the key and must run the computation. Carries
    /// the prior `created_at` when overwriting an expired entry.
    Leader(Option<DateTime<Utc>>),
    /// Another caller's computation is in flight; await it.
    Follower,
}

/// Generic get-or-compute cache with TTL and stampede protection.
///
/// Clones share the same underlying entry map, so a clone can be handed to
/// the reaper task or to invalidation hooks cheaply.
pub struct CacheStore<T> {
    name: &'static str,
    entries: Arc<DashMap<CacheKey, EntryState<T>>>,
    ttl: Duration,
    stats: Arc<CacheStats>,
}

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache namespace with the given TTL.
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            entries: Arc::new(DashMap::new()),
            ttl,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Return the cached payload for `key`, computing it at most once.
    ///
    /// The computation runs on a spawned task and continues to completion
    /// even if this caller stops awaiting, so the cost is never discarded
    /// on cancellation.
    ///
    /// # Errors
    ///
    /// Propagates the compute function's error to every caller awaiting
    /// this key; a panicking computation surfaces as
    /// [`DepctxError::CacheCompute`]. Either way the key is released for
    /// retry.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<T, DepctxError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DepctxError>> + Send + 'static,
    {
        let (inflight, role) = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get() {
                EntryState::Ready(entry) if !entry.is_expired(self.ttl) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        cache = self.name,
                        user = %key.user_id,
                        resource = %key.resource_id,
                        fingerprint = key.fingerprint.short(),
                        "cache hit"
                    );
                    return Ok(entry.payload.clone());
                }
                EntryState::Ready(expired) => {
                    let created_at = expired.created_at;
                    let inflight = Arc::new(InFlight::new());
                    occupied.insert(EntryState::Pending(Arc::clone(&inflight)));
                    (inflight, Role::Leader(Some(created_at)))
                }
                EntryState::Pending(inflight) => (Arc::clone(inflight), Role::Follower),
            },
            Entry::Vacant(vacant) => {
                let inflight = Arc::new(InFlight::new());
                vacant.insert(EntryState::Pending(Arc::clone(&inflight)));
                (inflight, Role::Leader(None))
            }
        };

        if let Role::Leader(prior_created_at) = role {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                cache = self.name,
                user = %key.user_id,
                resource = %key.resource_id,
                fingerprint = key.fingerprint.short(),
                "cache miss, computing"
            );
            self.spawn_compute(key, Arc::clone(&inflight), prior_created_at, compute);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }

        Self::await_inflight(&inflight).await
    }

    /// Run the computation on its own task and publish the outcome.
    fn spawn_compute<F, Fut>(
        &self,
        key: CacheKey,
        inflight: Arc<InFlight<T>>,
        prior_created_at: Option<DateTime<Utc>>,
        compute: F,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, DepctxError>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let stats = Arc::clone(&self.stats);
        let name = self.name;

        tokio::spawn(async move {
            // Inner spawn so a panic in the computation is caught and
            // reported instead of leaving waiters hanging.
            let result = match tokio::spawn(compute()).await {
                Ok(result) => result,
                Err(join_err) => Err(DepctxError::CacheCompute {
                    message: format!("computation task failed: {join_err}"),
                }),
            };

            match &result {
                Ok(payload) => {
                    stats.computations.fetch_add(1, Ordering::Relaxed);
                    let now = Utc::now();
                    let entry = CacheEntry {
                        payload: payload.clone(),
                        created_at: prior_created_at.unwrap_or(now),
                        updated_at: now,
                        stored_at: Instant::now(),
                    };
                    // Publish only if our claim still owns the key. If the
                    // entry was invalidated mid-flight, dropping the result
                    // from the map keeps invalidation authoritative; the
                    // waiters still receive the payload directly.
                    if let Entry::Occupied(mut occupied) = entries.entry(key) {
                        let ours = matches!(
                            occupied.get(),
                            EntryState::Pending(p) if Arc::ptr_eq(p, &inflight)
                        );
                        if ours {
                            occupied.insert(EntryState::Ready(entry));
                        }
                    }
                }
                Err(err) => {
                    stats.compute_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        cache = name,
                        error = %err,
                        "cache computation failed, releasing key"
                    );
                    entries.remove_if(&key, |_, state| {
                        matches!(state, EntryState::Pending(p) if Arc::ptr_eq(p, &inflight))
                    });
                }
            }

            inflight.complete(result);
        });
    }

    async fn await_inflight(inflight: &InFlight<T>) -> Result<T, DepctxError> {
        loop {
            // Register before checking the slot so a completion between the
            // check and the await still wakes us.
            let notified = inflight.notify.notified();
            if let Some(result) = inflight.peek() {
                return result;
            }
            notified.await;
        }
    }

    /// Remove every entry belonging to `user_id`.
    ///
    /// Idempotent and safe to call redundantly. In-flight computations for
    /// removed keys still deliver their result to current waiters but do
    /// not re-enter the map.
    pub fn invalidate_user(&self, user_id: &UserId) -> usize {
        let mut removed = 0usize;
        self.entries.retain(|key, _| {
            if key.user_id == *user_id {
                removed += 1;
                false
            } else {
                true
            }
        });
        self.stats.invalidated.fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            tracing::debug!(
                cache = self.name,
                user = %user_id,
                removed,
                "invalidated cache entries"
            );
        }
        removed
    }

    /// Remove every expired `Ready` entry. Pending entries are never
    /// touched.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0usize;
        self.entries.retain(|_, state| match state {
            EntryState::Ready(entry) if entry.is_expired(self.ttl) => {
                removed += 1;
                false
            }
            _ => true,
        });
        self.stats.reaped.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drop every entry (cache-wide flush, e.g. after a catalog reload).
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently in the map, pending included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counter snapshot for metrics export.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
