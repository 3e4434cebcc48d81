//! depctx - Dependency Validation & Context Aggregation Cache
//!
//! An in-process library for platforms that generate interdependent
//! AI-authored content artifacts ("resources"), where an ideal-customer
//! profile must exist before a buyer persona can be generated, which in
//! turn feeds sales messaging. Generating a resource is expensive (external
//! AI calls billed per token), so both the "may I generate this?" check and
//! the prompt-context assembly are computed once and cached per version of
//! the user's resource set.
//!
//! # Architecture Overview
//!
//! A generation request for resource X flows through three stages:
//!
//! 1. **Validation** - the target's transitive prerequisite graph is walked
//!    against the user's completed-resource snapshot, yielding the missing
//!    prerequisites, a deterministic generation order, and a cost estimate.
//! 2. **Aggregation** - content of already-generated dependencies is
//!    assembled into a tiered, token-budgeted prompt bundle (critical /
//!    required / optional, by dependency kind).
//! 3. **Caching** - both results are cached under
//!    `(user, resource, fingerprint)` where the fingerprint is a SHA-256
//!    digest of the sorted resource-ID set, with per-key stampede
//!    protection, TTL expiry, and coarse per-user invalidation.
//!
//! # Core Modules
//!
//! - [`catalog`] - static resource definitions, validated acyclic at load
//! - [`graph`] - induced prerequisite subgraphs, cycle detection, topo order
//! - [`validator`] - "can X be generated now?" with actionable output
//! - [`aggregator`] - tiered token-budgeted context assembly
//! - [`fingerprint`] - canonical hashing of the completed-resource set
//! - [`cache`] - get-or-compute store with stampede protection and TTL
//! - [`pipeline`] - the facade wiring everything together
//!
//! ## Supporting Modules
//!
//! - [`core`] - identifier newtypes and the crate error enum
//! - [`config`] - tunable budgets, TTL, and reaper interval
//! - [`tokens`] - pluggable token estimation
//! - [`metrics`] - hit/miss/latency counters for observability sinks
//!
//! # Example
//!
//! ```rust
//! use depctx::catalog::{DependencyKind, ResourceCatalog, ResourceDefinition};
//! use depctx::config::DepctxConfig;
//! use depctx::pipeline::ContextPipeline;
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), depctx::core::DepctxError> {
//! let catalog = Arc::new(ResourceCatalog::new(vec![
//!     ResourceDefinition::new("icp-analysis", "analysis"),
//!     ResourceDefinition::new("buyer-persona", "persona")
//!         .with_dependency("icp-analysis", DependencyKind::Prerequisite),
//! ])?);
//!
//! let pipeline = ContextPipeline::new(catalog, DepctxConfig::default())?;
//!
//! let user = "user-1".into();
//! let snapshot = HashSet::new();
//! let result = pipeline.validate(&user, &"buyer-persona".into(), &snapshot).await?;
//! assert!(!result.valid);
//! assert_eq!(result.suggested_order.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod core;
pub mod fingerprint;
pub mod graph;
pub mod metrics;
pub mod pipeline;
pub mod tokens;
pub mod validator;

pub use aggregator::{AggregatedContext, ContentProvider, ContextAggregator, ContextFragment};
pub use cache::{CacheKey, CacheStore};
pub use catalog::{DependencyKind, ResourceCatalog, ResourceDefinition};
pub use config::{DepctxConfig, TierBudgets};
pub use crate::core::{DepctxError, ResourceId, UserId};
pub use fingerprint::Fingerprint;
pub use pipeline::ContextPipeline;
pub use validator::{DependencyValidator, ValidationResult};
