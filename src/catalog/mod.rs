//! Static resource catalog: declarations of resource types and their
//! dependencies.
//!
//! The catalog is loaded once at startup (from TOML or built in code),
//! validated, and then treated as immutable for the process lifetime.
//! Validation happens entirely at load time: duplicate IDs, references to
//! undeclared resources, self-dependencies, and cycles are all rejected
//! before the first request is served, so request-path traversal never has
//! to re-verify the graph shape.
//!
//! Declaration order matters: topological ties during order computation and
//! the processing order of aggregation candidates both follow the order in
//! which definitions (and their dependency lists) appear in the catalog.
//!
//! # Catalog file format
//!
//! ```toml
//! [[resources]]
//! id = "icp-analysis"
//! category = "analysis"
//! cost = 3
//!
//! [[resources]]
//! id = "buyer-persona"
//! category = "persona"
//! dependencies = [
//!     { id = "icp-analysis", kind = "prerequisite" },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::core::{DepctxError, ResourceId};
use crate::graph::ResourceGraph;

/// How a dependency participates in validation and aggregation.
///
/// Only `Prerequisite` edges are hard requirements for validation; the other
/// kinds enrich the aggregated context but never block generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Hard requirement: the target cannot be generated without it.
    Prerequisite,
    /// Soft: included in tier 2 of the aggregated context if available.
    ContextEnhancer,
    /// Soft: included in tier 3 with leftover budget.
    DataSource,
    /// Soft: included in tier 3 with leftover budget.
    TemplateBase,
}

impl DependencyKind {
    /// Whether this edge blocks validity when the dependency is absent.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Prerequisite)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Prerequisite => "prerequisite",
            Self::ContextEnhancer => "context_enhancer",
            Self::DataSource => "data_source",
            Self::TemplateBase => "template_base",
        };
        f.write_str(s)
    }
}

/// A single dependency declaration on another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// The resource this dependency points at.
    pub id: ResourceId,
    /// How the dependency participates in validation and aggregation.
    pub kind: DependencyKind,
}

const fn default_cost() -> u32 {
    1
}

/// Static definition of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Unique resource identifier.
    pub id: ResourceId,
    /// Free-form grouping label (e.g. `"analysis"`, `"messaging"`).
    pub category: String,
    /// Declared dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Relative generation cost, summed into `estimated_cost` during
    /// validation. Unit is caller-defined (credits, cents, calls).
    #[serde(default = "default_cost")]
    pub cost: u32,
}

impl ResourceDefinition {
    /// Create a definition with no dependencies and default cost.
    pub fn new(id: impl Into<ResourceId>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            dependencies: Vec::new(),
            cost: default_cost(),
        }
    }

    /// Append a dependency declaration.
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<ResourceId>, kind: DependencyKind) -> Self {
        self.dependencies.push(DependencySpec {
            id: id.into(),
            kind,
        });
        self
    }

    /// Set the generation cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }
}

/// On-disk shape of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    resources: Vec<ResourceDefinition>,
}

/// Read-only registry of resource definitions.
///
/// Preserves declaration order and offers O(1) lookup by ID. Constructing a
/// catalog validates the full dependency relation; a successfully built
/// catalog is guaranteed acyclic with every reference resolvable.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    definitions: Vec<ResourceDefinition>,
    index: HashMap<ResourceId, usize>,
}

impl ResourceCatalog {
    /// Build and validate a catalog from definitions.
    ///
    /// # Errors
    ///
    /// - [`DepctxError::DuplicateResource`] if an ID is declared twice
    /// - [`DepctxError::UnknownDependency`] if a dependency references an
    ///   undeclared resource
    /// - [`DepctxError::GraphCycle`] if the dependency relation (over all
    ///   kinds) contains a cycle, including self-dependencies
    pub fn new(definitions: Vec<ResourceDefinition>) -> Result<Self, DepctxError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (ordinal, def) in definitions.iter().enumerate() {
            if index.insert(def.id.clone(), ordinal).is_some() {
                return Err(DepctxError::DuplicateResource {
                    id: def.id.to_string(),
                });
            }
        }

        for def in &definitions {
            for dep in &def.dependencies {
                if !index.contains_key(&dep.id) {
                    return Err(DepctxError::UnknownDependency {
                        id: dep.id.to_string(),
                        declared_by: def.id.to_string(),
                    });
                }
            }
        }

        let catalog = Self {
            definitions,
            index,
        };

        // One-time cycle check over every edge kind; request traversal
        // relies on this having passed.
        ResourceGraph::full(&catalog).detect_cycles()?;

        tracing::debug!(
            resources = catalog.definitions.len(),
            "resource catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse and validate a catalog from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::CatalogParse`] on syntax errors, plus every
    /// validation error [`Self::new`] can produce.
    pub fn from_toml_str(content: &str) -> Result<Self, DepctxError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| DepctxError::CatalogParse {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            })?;
        Self::new(file.resources)
    }

    /// Load and validate a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::CatalogParse`] if the file cannot be read or
    /// parsed, plus every validation error [`Self::new`] can produce.
    pub fn from_path(path: &Path) -> Result<Self, DepctxError> {
        let content = std::fs::read_to_string(path).map_err(|e| DepctxError::CatalogParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file: CatalogFile =
            toml::from_str(&content).map_err(|e| DepctxError::CatalogParse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::new(file.resources)
    }

    /// Look up a definition by ID.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&ResourceDefinition> {
        self.index.get(id).map(|&i| &self.definitions[i])
    }

    /// Declaration index of a resource, used for deterministic tie-breaking.
    #[must_use]
    pub fn ordinal(&self, id: &ResourceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Whether the catalog declares the given resource.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains_key(id)
    }

    /// Generation cost of a resource, if declared.
    #[must_use]
    pub fn cost_of(&self, id: &ResourceId) -> Option<u32> {
        self.get(id).map(|d| d.cost)
    }

    /// All definitions in declaration order.
    #[must_use]
    pub fn definitions(&self) -> &[ResourceDefinition] {
        &self.definitions
    }

    /// Number of declared resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog declares no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition::new("icp-analysis", "analysis"),
            ResourceDefinition::new("buyer-persona", "persona")
                .with_dependency("icp-analysis", DependencyKind::Prerequisite),
        ]
    }

    #[test]
    fn builds_valid_catalog() {
        let catalog = ResourceCatalog::new(two_step()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.ordinal(&"icp-analysis".into()), Some(0));
        assert_eq!(catalog.cost_of(&"buyer-persona".into()), Some(1));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let defs = vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("a", "y"),
        ];
        let err = ResourceCatalog::new(defs).unwrap_err();
        assert!(matches!(err, DepctxError::DuplicateResource { id } if id == "a"));
    }

    #[test]
    fn rejects_undeclared_dependency() {
        let defs = vec![
            ResourceDefinition::new("a", "x").with_dependency("ghost", DependencyKind::DataSource),
        ];
        let err = ResourceCatalog::new(defs).unwrap_err();
        assert!(matches!(
            err,
            DepctxError::UnknownDependency { id, declared_by }
                if id == "ghost" && declared_by == "a"
        ));
    }

    #[test]
    fn rejects_cycle_at_load_time() {
        let defs = vec![
            ResourceDefinition::new("a", "x").with_dependency("b", DependencyKind::Prerequisite),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
        ];
        let err = ResourceCatalog::new(defs).unwrap_err();
        assert!(matches!(err, DepctxError::GraphCycle { .. }));
    }

    #[test]
    fn rejects_self_dependency() {
        let defs = vec![
            ResourceDefinition::new("a", "x").with_dependency("a", DependencyKind::Prerequisite),
        ];
        let err = ResourceCatalog::new(defs).unwrap_err();
        assert!(matches!(err, DepctxError::GraphCycle { .. }));
    }

    #[test]
    fn soft_edge_cycles_are_also_rejected() {
        // The DAG invariant covers the full relation, not just prerequisites.
        let defs = vec![
            ResourceDefinition::new("a", "x").with_dependency("b", DependencyKind::ContextEnhancer),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::DataSource),
        ];
        assert!(matches!(
            ResourceCatalog::new(defs).unwrap_err(),
            DepctxError::GraphCycle { .. }
        ));
    }

    #[test]
    fn parses_toml_catalog() {
        let toml = r#"
            [[resources]]
            id = "icp-analysis"
            category = "analysis"
            cost = 3

            [[resources]]
            id = "buyer-persona"
            category = "persona"
            dependencies = [
                { id = "icp-analysis", kind = "prerequisite" },
            ]
        "#;
        let catalog = ResourceCatalog::from_toml_str(toml).unwrap();
        assert_eq!(catalog.cost_of(&"icp-analysis".into()), Some(3));
        let persona = catalog.get(&"buyer-persona".into()).unwrap();
        assert_eq!(persona.dependencies.len(), 1);
        assert_eq!(persona.dependencies[0].kind, DependencyKind::Prerequisite);
    }

    #[test]
    fn toml_syntax_error_is_reported() {
        let err = ResourceCatalog::from_toml_str("[[resources").unwrap_err();
        assert!(matches!(err, DepctxError::CatalogParse { .. }));
    }
}
