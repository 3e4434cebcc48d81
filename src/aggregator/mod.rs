//! Context aggregation: assembling the tiered, token-budgeted prompt bundle.
//!
//! Given a target resource and the content of the user's already-generated
//! dependencies, the aggregator builds three tiers of context fragments:
//!
//! - **Tier 1 (critical)**: `prerequisite`-kind dependencies. Always
//!   included; degrades by truncation, never omission. A reserve-ahead
//!   allocation guarantees each remaining tier-1 fragment at least the
//!   configured minimum fragment size while the budget allows it.
//! - **Tier 2 (required)**: `context_enhancer`-kind dependencies. Included
//!   whole while the tier budget allows; degrades by omission.
//! - **Tier 3 (optional)**: `data_source`/`template_base`-kind dependencies.
//!   Included whole with leftover tier-3 budget; degrades by omission.
//!
//! Candidates are processed in catalog declaration order, restricted to
//! resources the user has actually generated. The total token count can
//! never exceed the sum of the tier budgets: each fragment is admitted only
//! against its tier's remaining budget, so the invariant holds by
//! construction rather than by a post-hoc check.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::catalog::{DependencyKind, ResourceCatalog};
use crate::config::TierBudgets;
use crate::core::{DepctxError, ResourceId, UserId};
use crate::tokens::{TokenEstimator, format_token_count};

/// A (possibly truncated) excerpt of a prerequisite resource's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFragment {
    /// The resource the excerpt came from.
    pub source_resource_id: ResourceId,
    /// The excerpt itself, truncated to fit its tier allotment.
    pub summary: String,
    /// Estimated token count of `summary`.
    pub token_estimate: usize,
}

/// Token accounting per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCounts {
    /// Tokens consumed by tier-1 fragments.
    pub tier1: usize,
    /// Tokens consumed by tier-2 fragments.
    pub tier2: usize,
    /// Tokens consumed by tier-3 fragments.
    pub tier3: usize,
    /// Sum of the three tiers; never exceeds the budget total.
    pub total: usize,
}

/// The assembled context bundle handed to the AI prompt builder.
///
/// Immutable once computed; cached under the user's resource-set
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedContext {
    /// Critical fragments from prerequisite dependencies.
    pub tier1_critical: Vec<ContextFragment>,
    /// Required fragments from context-enhancer dependencies.
    pub tier2_required: Vec<ContextFragment>,
    /// Optional fragments from data-source and template-base dependencies.
    pub tier3_optional: Vec<ContextFragment>,
    /// Tiers concatenated in order with resource-identifying headers.
    pub formatted_prompt: String,
    /// Token accounting per tier.
    pub token_counts: TokenCounts,
}

/// Read-only lookup from resource ID to stored content.
///
/// Supplied by the external `UserResourceSet` provider; the aggregator never
/// writes through it.
pub trait ContentProvider: Send + Sync {
    /// Content of a generated resource, or `None` if nothing is stored.
    fn content_of(&self, id: &ResourceId) -> Option<String>;
}

impl ContentProvider for HashMap<ResourceId, String> {
    fn content_of(&self, id: &ResourceId) -> Option<String> {
        self.get(id).cloned()
    }
}

/// Which tier a dependency kind lands in.
const fn tier_of(kind: DependencyKind) -> u8 {
    match kind {
        DependencyKind::Prerequisite => 1,
        DependencyKind::ContextEnhancer => 2,
        DependencyKind::DataSource | DependencyKind::TemplateBase => 3,
    }
}

/// Assembles tiered context bundles within a hard token budget.
#[derive(Clone)]
pub struct ContextAggregator {
    catalog: Arc<ResourceCatalog>,
    budgets: TierBudgets,
    min_fragment_tokens: usize,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextAggregator {
    /// Create an aggregator over the given catalog.
    #[must_use]
    pub fn new(
        catalog: Arc<ResourceCatalog>,
        budgets: TierBudgets,
        min_fragment_tokens: usize,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Self {
        Self {
            catalog,
            budgets,
            min_fragment_tokens,
            estimator,
        }
    }

    /// Aggregate context for generating `target` on behalf of `user_id`.
    ///
    /// Only dependencies present in `user_resource_set` contribute; content
    /// is fetched through `provider`.
    ///
    /// # Errors
    ///
    /// - [`DepctxError::UnknownResource`] if `target` is not in the catalog
    /// - [`DepctxError::TokenBudget`] if a tier budget is zero
    /// - [`DepctxError::ContentUnavailable`] if a generated resource has no
    ///   retrievable content
    pub fn aggregate(
        &self,
        user_id: &UserId,
        target: &ResourceId,
        user_resource_set: &HashSet<ResourceId>,
        provider: &dyn ContentProvider,
    ) -> Result<AggregatedContext, DepctxError> {
        self.budgets.validate()?;

        let definition = self.catalog.get(target).ok_or_else(|| DepctxError::UnknownResource {
            id: target.to_string(),
        })?;

        // Partition candidates by tier, preserving declaration order and
        // keeping only dependencies the user has generated.
        let mut candidates: [Vec<(ResourceId, String)>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for dep in &definition.dependencies {
            if !user_resource_set.contains(&dep.id) {
                continue;
            }
            let content =
                provider.content_of(&dep.id).ok_or_else(|| DepctxError::ContentUnavailable {
                    id: dep.id.to_string(),
                })?;
            candidates[usize::from(tier_of(dep.kind)) - 1].push((dep.id.clone(), content));
        }

        let [tier1_in, tier2_in, tier3_in] = candidates;
        let tier1_critical = self.fill_tier1(tier1_in);
        let tier2_required = self.fill_by_omission(tier2_in, self.budgets.tier2);
        let tier3_optional = self.fill_by_omission(tier3_in, self.budgets.tier3);

        let token_counts = TokenCounts {
            tier1: tier1_critical.iter().map(|f| f.token_estimate).sum(),
            tier2: tier2_required.iter().map(|f| f.token_estimate).sum(),
            tier3: tier3_optional.iter().map(|f| f.token_estimate).sum(),
            total: 0,
        };
        let token_counts = TokenCounts {
            total: token_counts.tier1 + token_counts.tier2 + token_counts.tier3,
            ..token_counts
        };

        let formatted_prompt =
            format_prompt(&tier1_critical, &tier2_required, &tier3_optional);

        tracing::debug!(
            user = %user_id,
            target = %target,
            tier1 = tier1_critical.len(),
            tier2 = tier2_required.len(),
            tier3 = tier3_optional.len(),
            tokens = %format_token_count(token_counts.total),
            "aggregated context"
        );

        Ok(AggregatedContext {
            tier1_critical,
            tier2_required,
            tier3_optional,
            formatted_prompt,
            token_counts,
        })
    }

    /// Tier 1: every candidate is included; oversize content is truncated.
    ///
    /// Allocation reserves `min_fragment_tokens` ahead for each remaining
    /// candidate, so an early oversized fragment cannot starve later ones
    /// as long as the budget covers the minimums.
    fn fill_tier1(&self, candidates: Vec<(ResourceId, String)>) -> Vec<ContextFragment> {
        let mut fragments = Vec::with_capacity(candidates.len());
        let mut remaining = self.budgets.tier1;
        let count = candidates.len();

        for (i, (id, content)) in candidates.into_iter().enumerate() {
            let rest = count - i - 1;
            let reserved = self.min_fragment_tokens.saturating_mul(rest);
            let headroom = remaining.saturating_sub(reserved);
            let floor = self.min_fragment_tokens.min(remaining);
            let allotment = headroom.max(floor);

            let estimate = self.estimator.estimate(&content);
            let summary = if estimate <= allotment {
                content
            } else {
                tracing::debug!(
                    resource = %id,
                    estimate,
                    allotment,
                    "truncating tier-1 fragment to fit budget"
                );
                self.estimator.truncate_to(&content, allotment)
            };

            let token_estimate = self.estimator.estimate(&summary);
            remaining = remaining.saturating_sub(token_estimate);
            fragments.push(ContextFragment {
                source_resource_id: id,
                summary,
                token_estimate,
            });
        }

        fragments
    }

    /// Tiers 2 and 3: candidates are included whole or skipped.
    fn fill_by_omission(
        &self,
        candidates: Vec<(ResourceId, String)>,
        budget: usize,
    ) -> Vec<ContextFragment> {
        let mut fragments = Vec::new();
        let mut remaining = budget;

        for (id, content) in candidates {
            let estimate = self.estimator.estimate(&content);
            if estimate > remaining {
                tracing::debug!(
                    resource = %id,
                    estimate,
                    remaining,
                    "omitting fragment, tier budget exhausted"
                );
                continue;
            }
            remaining -= estimate;
            fragments.push(ContextFragment {
                source_resource_id: id,
                summary: content,
                token_estimate: estimate,
            });
        }

        fragments
    }
}

fn format_prompt(
    tier1: &[ContextFragment],
    tier2: &[ContextFragment],
    tier3: &[ContextFragment],
) -> String {
    let mut prompt = String::new();
    for (banner, fragments) in [
        ("# Critical Context", tier1),
        ("# Supporting Context", tier2),
        ("# Supplemental Context", tier3),
    ] {
        if fragments.is_empty() {
            continue;
        }
        prompt.push_str(banner);
        prompt.push('\n');
        for fragment in fragments {
            prompt.push_str(&format!(
                "## Source: {}\n{}\n\n",
                fragment.source_resource_id, fragment.summary
            ));
        }
    }
    prompt
}
