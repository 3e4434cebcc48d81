//! The pipeline facade the Resource Generation Service talks to.
//!
//! [`ContextPipeline`] wires the validator, aggregator, both cache
//! namespaces, the TTL reapers, and the metrics counters together. Control
//! flow for a generation request:
//!
//! 1. The caller snapshots the user's resource set and calls
//!    [`ContextPipeline::validate`]; the snapshot's fingerprint becomes part
//!    of the cache key, so a lookup after any set change misses naturally.
//! 2. If valid, the caller fetches the prompt bundle via
//!    [`ContextPipeline::aggregate`].
//! 3. After the AI call succeeds and the new resource is durably recorded,
//!    the caller fires [`ContextPipeline::on_resource_generated`], which
//!    drops every cache entry for that user across both namespaces.
//!
//! Validation results and aggregated contexts are cached independently:
//! they are read by different callers and the validation result is useful
//! on its own (e.g. to render a "generate these first" list).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::aggregator::{AggregatedContext, ContentProvider, ContextAggregator};
use crate::cache::{CacheKey, CacheStore, ReaperHandle};
use crate::catalog::ResourceCatalog;
use crate::config::DepctxConfig;
use crate::core::{DepctxError, ResourceId, UserId};
use crate::fingerprint::Fingerprint;
use crate::graph::ResourceGraph;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::tokens::{HeuristicTokenEstimator, TokenEstimator};
use crate::validator::{DependencyValidator, ValidationResult};

/// Entry point of the subsystem.
///
/// Cheap to share behind an `Arc`; all internal state is already
/// reference-counted. Dropping the pipeline stops its reaper tasks.
pub struct ContextPipeline {
    catalog: Arc<ResourceCatalog>,
    validator: DependencyValidator,
    aggregator: ContextAggregator,
    validation_cache: CacheStore<ValidationResult>,
    context_cache: CacheStore<AggregatedContext>,
    metrics: Arc<PipelineMetrics>,
    _reapers: [ReaperHandle; 2],
}

impl ContextPipeline {
    /// Build a pipeline with the default byte-heuristic token estimator.
    ///
    /// Must be called from within a tokio runtime; the reaper tasks are
    /// spawned here.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::TokenBudget`] if the configured budgets are
    /// unusable, so misconfiguration fails at startup instead of on the
    /// first request.
    pub fn new(catalog: Arc<ResourceCatalog>, config: DepctxConfig) -> Result<Self, DepctxError> {
        Self::with_estimator(catalog, config, Arc::new(HeuristicTokenEstimator::default()))
    }

    /// Build a pipeline with a custom token estimator (e.g. a real BPE
    /// tokenizer matching the downstream model).
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::TokenBudget`] if the configured budgets are
    /// unusable.
    pub fn with_estimator(
        catalog: Arc<ResourceCatalog>,
        config: DepctxConfig,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Result<Self, DepctxError> {
        config.budgets.validate()?;

        let validator = DependencyValidator::new(Arc::clone(&catalog));
        let aggregator = ContextAggregator::new(
            Arc::clone(&catalog),
            config.budgets,
            config.min_fragment_tokens,
            estimator,
        );

        let validation_cache: CacheStore<ValidationResult> =
            CacheStore::new("validation", config.cache.ttl());
        let context_cache: CacheStore<AggregatedContext> =
            CacheStore::new("context", config.cache.ttl());

        let reapers = [
            validation_cache.spawn_reaper(config.cache.reap_interval()),
            context_cache.spawn_reaper(config.cache.reap_interval()),
        ];

        tracing::info!(
            resources = catalog.len(),
            ttl_secs = config.cache.ttl_secs,
            "context pipeline started"
        );

        Ok(Self {
            catalog,
            validator,
            aggregator,
            validation_cache,
            context_cache,
            metrics: Arc::new(PipelineMetrics::default()),
            _reapers: reapers,
        })
    }

    /// Validate whether `target` can be generated for `user_id`, using the
    /// cached result when the user's resource set is unchanged.
    ///
    /// # Errors
    ///
    /// [`DepctxError::UnknownResource`] for targets outside the catalog;
    /// cache-layer failures as [`DepctxError::CacheCompute`].
    pub async fn validate(
        &self,
        user_id: &UserId,
        target: &ResourceId,
        user_resource_set: &HashSet<ResourceId>,
    ) -> Result<ValidationResult, DepctxError> {
        let key = self.cache_key(user_id, target, user_resource_set);

        let validator = self.validator.clone();
        let metrics = Arc::clone(&self.metrics);
        let user = user_id.clone();
        let target = target.clone();
        let snapshot = user_resource_set.clone();

        self.validation_cache
            .get_or_compute(key, move || async move {
                let started = Instant::now();
                let result = validator.validate(&user, &target, &snapshot)?;
                metrics.record_validation(started.elapsed());
                Ok(result)
            })
            .await
    }

    /// Assemble (or fetch the cached) context bundle for generating
    /// `target`.
    ///
    /// The provider is only consulted on a cache miss.
    ///
    /// # Errors
    ///
    /// [`DepctxError::UnknownResource`], [`DepctxError::TokenBudget`],
    /// [`DepctxError::ContentUnavailable`] from the aggregation itself;
    /// cache-layer failures as [`DepctxError::CacheCompute`].
    pub async fn aggregate(
        &self,
        user_id: &UserId,
        target: &ResourceId,
        user_resource_set: &HashSet<ResourceId>,
        provider: Arc<dyn ContentProvider>,
    ) -> Result<AggregatedContext, DepctxError> {
        let key = self.cache_key(user_id, target, user_resource_set);

        let aggregator = self.aggregator.clone();
        let metrics = Arc::clone(&self.metrics);
        let user = user_id.clone();
        let target = target.clone();
        let snapshot = user_resource_set.clone();

        self.context_cache
            .get_or_compute(key, move || async move {
                let started = Instant::now();
                let context = aggregator.aggregate(&user, &target, &snapshot, provider.as_ref())?;
                metrics.record_aggregation(started.elapsed(), context.token_counts.total);
                Ok(context)
            })
            .await
    }

    /// Invalidation hook: drop every cache entry for `user_id` in both
    /// namespaces.
    ///
    /// Fired by the generation service right after a resource is durably
    /// recorded. Coarse on purpose: the fingerprint already guarantees
    /// correctness, this reclaims the orphaned entries. Idempotent.
    ///
    /// Returns the number of entries removed.
    pub fn on_resource_generated(&self, user_id: &UserId) -> usize {
        let removed = self.validation_cache.invalidate_user(user_id)
            + self.context_cache.invalidate_user(user_id);
        tracing::info!(user = %user_id, removed, "resource generated, caches invalidated");
        removed
    }

    /// Drop every entry in both caches.
    ///
    /// The escape hatch for catalog reloads, which otherwise require a
    /// process restart.
    pub fn flush(&self) {
        self.validation_cache.clear();
        self.context_cache.clear();
        tracing::info!("caches flushed");
    }

    /// Render the target's prerequisite tree for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::UnknownResource`] if `target` is not in the
    /// catalog.
    pub fn dependency_tree(&self, target: &ResourceId) -> Result<String, DepctxError> {
        let graph = ResourceGraph::induced_prerequisites(&self.catalog, target)?;
        Ok(graph.to_tree_string(target))
    }

    /// The catalog this pipeline serves.
    #[must_use]
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Counter snapshot across both caches and the compute path.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.validation_cache.stats(), self.context_cache.stats())
    }

    fn cache_key(
        &self,
        user_id: &UserId,
        target: &ResourceId,
        user_resource_set: &HashSet<ResourceId>,
    ) -> CacheKey {
        CacheKey {
            user_id: user_id.clone(),
            resource_id: target.clone(),
            fingerprint: Fingerprint::of_set(user_resource_set),
        }
    }
}
