//! Dependency validation: "can resource X be generated for user U now?"
//!
//! Validation walks the target's transitive prerequisite graph, lists every
//! prerequisite absent from the user's resource set, and produces a
//! deterministic generation order plus a cost estimate. Soft dependency
//! kinds (`context_enhancer`, `data_source`, `template_base`) never block
//! validity; they are consumed by the aggregator instead.
//!
//! A missing prerequisite is not an error: it is encoded as
//! `ValidationResult { valid: false, .. }` with the actionable list attached.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::ResourceCatalog;
use crate::core::{DepctxError, ResourceId, UserId};
use crate::graph::ResourceGraph;

/// Outcome of validating a generation request.
///
/// Immutable once computed; cached under the user's resource-set
/// fingerprint for the cache TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` iff no prerequisite is missing.
    pub valid: bool,
    /// Transitive prerequisite-kind dependencies absent from the user's
    /// resource set, in generation order.
    pub missing_dependencies: Vec<ResourceId>,
    /// Topological order of the missing dependencies plus the target.
    /// Generating resources in this order never hits a missing
    /// prerequisite.
    pub suggested_order: Vec<ResourceId>,
    /// Sum of the per-resource cost of everything in `suggested_order`.
    pub estimated_cost: u64,
}

/// Validates generation requests against the catalog's prerequisite graph.
#[derive(Clone)]
pub struct DependencyValidator {
    catalog: Arc<ResourceCatalog>,
}

impl DependencyValidator {
    /// Create a validator over the given catalog.
    #[must_use]
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            catalog,
        }
    }

    /// Validate whether `target` can be generated for `user_id` given the
    /// snapshot of resources the user has already generated.
    ///
    /// Deterministic: identical inputs yield content-equal results, with
    /// topological ties broken by catalog declaration order.
    ///
    /// # Errors
    ///
    /// - [`DepctxError::UnknownResource`] if `target` is not in the catalog
    /// - [`DepctxError::GraphCycle`] if the catalog is malformed (defensive;
    ///   load-time validation makes this unreachable)
    pub fn validate(
        &self,
        user_id: &UserId,
        target: &ResourceId,
        user_resource_set: &HashSet<ResourceId>,
    ) -> Result<ValidationResult, DepctxError> {
        let graph = ResourceGraph::induced_prerequisites(&self.catalog, target)?;
        let full_order = graph.topological_order()?;

        let missing_dependencies: Vec<ResourceId> = full_order
            .iter()
            .filter(|id| *id != target && !user_resource_set.contains(*id))
            .cloned()
            .collect();

        // Missing dependencies plus the target, keeping topological order.
        let suggested_order: Vec<ResourceId> = full_order
            .iter()
            .filter(|id| *id == target || missing_dependencies.contains(*id))
            .cloned()
            .collect();

        let estimated_cost = suggested_order
            .iter()
            .map(|id| u64::from(self.catalog.cost_of(id).unwrap_or(0)))
            .sum();

        let valid = missing_dependencies.is_empty();

        tracing::debug!(
            user = %user_id,
            target = %target,
            valid,
            missing = missing_dependencies.len(),
            "validated generation request"
        );

        Ok(ValidationResult {
            valid,
            missing_dependencies,
            suggested_order,
            estimated_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DependencyKind, ResourceDefinition};

    fn validator(defs: Vec<ResourceDefinition>) -> DependencyValidator {
        DependencyValidator::new(Arc::new(ResourceCatalog::new(defs).unwrap()))
    }

    fn set(ids: &[&str]) -> HashSet<ResourceId> {
        ids.iter().map(|s| ResourceId::from(*s)).collect()
    }

    #[test]
    fn missing_prerequisite_invalidates() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
        ]);
        let result = v.validate(&"u1".into(), &"b".into(), &set(&[])).unwrap();
        assert!(!result.valid);
        assert_eq!(result.missing_dependencies, vec!["a".into()]);
        assert_eq!(result.suggested_order, vec!["a".into(), "b".into()]);
    }

    #[test]
    fn satisfied_prerequisite_validates() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
        ]);
        let result = v.validate(&"u1".into(), &"b".into(), &set(&["a"])).unwrap();
        assert!(result.valid);
        assert!(result.missing_dependencies.is_empty());
        assert_eq!(result.suggested_order, vec!["b".into()]);
    }

    #[test]
    fn soft_dependencies_never_block() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("d", "x"),
            ResourceDefinition::new("c", "x")
                .with_dependency("a", DependencyKind::Prerequisite)
                .with_dependency("d", DependencyKind::ContextEnhancer),
        ]);
        let result = v.validate(&"u1".into(), &"c".into(), &set(&["a"])).unwrap();
        assert!(result.valid);
        assert!(result.missing_dependencies.is_empty());
    }

    #[test]
    fn transitive_missing_dependencies_listed_in_order() {
        // c -> b -> a, nothing generated.
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("c", "x").with_dependency("b", DependencyKind::Prerequisite),
        ]);
        let result = v.validate(&"u1".into(), &"c".into(), &set(&[])).unwrap();
        assert_eq!(result.missing_dependencies, vec!["a".into(), "b".into()]);
        assert_eq!(
            result.suggested_order,
            vec!["a".into(), "b".into(), "c".into()]
        );
    }

    #[test]
    fn estimated_cost_sums_suggested_order() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x").with_cost(3),
            ResourceDefinition::new("b", "x")
                .with_dependency("a", DependencyKind::Prerequisite)
                .with_cost(5),
        ]);
        let result = v.validate(&"u1".into(), &"b".into(), &set(&[])).unwrap();
        assert_eq!(result.estimated_cost, 8);

        // Once a is generated only b remains in the order.
        let result = v.validate(&"u1".into(), &"b".into(), &set(&["a"])).unwrap();
        assert_eq!(result.estimated_cost, 5);
    }

    #[test]
    fn unknown_target_errors() {
        let v = validator(vec![ResourceDefinition::new("a", "x")]);
        let err = v.validate(&"u1".into(), &"ghost".into(), &set(&[])).unwrap_err();
        assert!(matches!(err, DepctxError::UnknownResource { id } if id == "ghost"));
    }

    #[test]
    fn validation_is_idempotent() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("c", "x")
                .with_dependency("a", DependencyKind::Prerequisite)
                .with_dependency("b", DependencyKind::Prerequisite),
        ]);
        let snapshot = set(&["a"]);
        let first = v.validate(&"u1".into(), &"c".into(), &snapshot).unwrap();
        let second = v.validate(&"u1".into(), &"c".into(), &snapshot).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn suggested_order_is_topological() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("c", "x").with_dependency("b", DependencyKind::Prerequisite),
            ResourceDefinition::new("d", "x")
                .with_dependency("a", DependencyKind::Prerequisite)
                .with_dependency("c", DependencyKind::Prerequisite),
        ]);
        let result = v.validate(&"u1".into(), &"d".into(), &set(&[])).unwrap();
        let pos = |id: &str| {
            result.suggested_order.iter().position(|r| r.as_str() == id).unwrap()
        };
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn result_serializes() {
        let v = validator(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
        ]);
        let result = v.validate(&"u1".into(), &"b".into(), &set(&[])).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: ValidationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
