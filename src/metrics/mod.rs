//! Pipeline metrics counters.
//!
//! Lightweight atomics exposed as a snapshot struct for whatever dashboard
//! sink the deployment wires up. The export format is not a contract; the
//! counters are.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::cache::CacheStatsSnapshot;

/// Counters the pipeline accumulates across requests.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    validations_computed: AtomicU64,
    aggregations_computed: AtomicU64,
    tokens_emitted: AtomicU64,
    compute_micros: AtomicU64,
}

impl PipelineMetrics {
    /// Record a completed validation computation.
    pub fn record_validation(&self, elapsed: Duration) {
        self.validations_computed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(elapsed);
    }

    /// Record a completed aggregation and its token total.
    pub fn record_aggregation(&self, elapsed: Duration, tokens: usize) {
        self.aggregations_computed.fetch_add(1, Ordering::Relaxed);
        self.tokens_emitted.fetch_add(tokens as u64, Ordering::Relaxed);
        self.record_latency(elapsed);
    }

    fn record_latency(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.compute_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn computed(&self) -> (u64, u64, u64, u64) {
        (
            self.validations_computed.load(Ordering::Relaxed),
            self.aggregations_computed.load(Ordering::Relaxed),
            self.tokens_emitted.load(Ordering::Relaxed),
            self.compute_micros.load(Ordering::Relaxed),
        )
    }

    /// Combine pipeline counters with per-cache counters into one export.
    #[must_use]
    pub fn snapshot(
        &self,
        validation_cache: CacheStatsSnapshot,
        context_cache: CacheStatsSnapshot,
    ) -> MetricsSnapshot {
        let (validations_computed, aggregations_computed, tokens_emitted, compute_micros) =
            self.computed();
        MetricsSnapshot {
            validation_cache,
            context_cache,
            validations_computed,
            aggregations_computed,
            tokens_emitted,
            compute_micros,
        }
    }
}

/// Point-in-time export of every counter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    /// Hit/miss counters of the validation-result cache.
    pub validation_cache: CacheStatsSnapshot,
    /// Hit/miss counters of the aggregated-context cache.
    pub context_cache: CacheStatsSnapshot,
    /// Validation computations that actually ran (cache misses).
    pub validations_computed: u64,
    /// Aggregation computations that actually ran (cache misses).
    pub aggregations_computed: u64,
    /// Total tokens across all aggregated contexts computed.
    pub tokens_emitted: u64,
    /// Cumulative computation latency in microseconds.
    pub compute_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_cache_stats() -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: 0,
            misses: 0,
            computations: 0,
            compute_failures: 0,
            invalidated: 0,
            reaped: 0,
        }
    }

    #[test]
    fn counters_accumulate() {
        let metrics = PipelineMetrics::default();
        metrics.record_validation(Duration::from_micros(120));
        metrics.record_aggregation(Duration::from_micros(380), 1500);
        metrics.record_aggregation(Duration::from_micros(100), 500);

        let snap = metrics.snapshot(empty_cache_stats(), empty_cache_stats());
        assert_eq!(snap.validations_computed, 1);
        assert_eq!(snap.aggregations_computed, 2);
        assert_eq!(snap.tokens_emitted, 2000);
        assert_eq!(snap.compute_micros, 600);
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = PipelineMetrics::default();
        let snap = metrics.snapshot(empty_cache_stats(), empty_cache_stats());
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("validation_cache").is_some());
        assert!(json.get("tokens_emitted").is_some());
    }
}
