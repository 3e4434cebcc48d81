//! Per-user dependency graph construction and traversal.
//!
//! This module provides the graph structure behind validation: building the
//! induced subgraph of a target resource and its transitive prerequisite
//! dependencies, detecting cycles, and computing a deterministic topological
//! order for suggested generation.
//!
//! The catalog is validated acyclic at load time, so the cycle check here is
//! defensive; it fails fast with the cycle path rather than looping.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::catalog::{DependencyKind, ResourceCatalog};
use crate::core::{DepctxError, ResourceId};

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// Directed dependency graph over resource IDs.
///
/// Edges run from a dependent resource to the resource it depends on, so
/// `neighbors(x)` yields `x`'s dependencies. Every node carries the catalog
/// declaration ordinal used for tie-breaking.
#[derive(Debug)]
pub struct ResourceGraph {
    graph: DiGraph<ResourceId, DependencyKind>,
    node_map: HashMap<ResourceId, NodeIndex>,
    ordinals: HashMap<ResourceId, usize>,
}

impl ResourceGraph {
    fn empty() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            ordinals: HashMap::new(),
        }
    }

    fn ensure_node(&mut self, id: &ResourceId, ordinal: usize) -> NodeIndex {
        if let Some(&index) = self.node_map.get(id) {
            index
        } else {
            let index = self.graph.add_node(id.clone());
            self.node_map.insert(id.clone(), index);
            self.ordinals.insert(id.clone(), ordinal);
            index
        }
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: DependencyKind) {
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Build the graph over every definition and every dependency kind.
    ///
    /// Used for the one-time load-time cycle check.
    #[must_use]
    pub fn full(catalog: &ResourceCatalog) -> Self {
        let mut g = Self::empty();
        for def in catalog.definitions() {
            let ordinal = catalog.ordinal(&def.id).unwrap_or(usize::MAX);
            let from = g.ensure_node(&def.id, ordinal);
            for dep in &def.dependencies {
                let dep_ordinal = catalog.ordinal(&dep.id).unwrap_or(usize::MAX);
                let to = g.ensure_node(&dep.id, dep_ordinal);
                g.add_edge(from, to, dep.kind);
            }
        }
        g
    }

    /// Build the induced subgraph of `target` and its transitive
    /// `prerequisite`-kind dependencies.
    ///
    /// Soft dependency kinds are not followed; they never block validity.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::UnknownResource`] if `target` is not declared.
    pub fn induced_prerequisites(
        catalog: &ResourceCatalog,
        target: &ResourceId,
    ) -> Result<Self, DepctxError> {
        if !catalog.contains(target) {
            return Err(DepctxError::UnknownResource {
                id: target.to_string(),
            });
        }

        let mut g = Self::empty();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        queue.push_back(target.clone());
        seen.insert(target.clone());

        while let Some(id) = queue.pop_front() {
            let Some(def) = catalog.get(&id) else {
                // Catalog validation guarantees resolvability; a miss here
                // means the catalog was mutated out from under us.
                return Err(DepctxError::UnknownResource {
                    id: id.to_string(),
                });
            };
            let ordinal = catalog.ordinal(&id).unwrap_or(usize::MAX);
            let from = g.ensure_node(&id, ordinal);
            for dep in &def.dependencies {
                if !dep.kind.is_blocking() {
                    continue;
                }
                let dep_ordinal = catalog.ordinal(&dep.id).unwrap_or(usize::MAX);
                let to = g.ensure_node(&dep.id, dep_ordinal);
                g.add_edge(from, to, dep.kind);
                if seen.insert(dep.id.clone()) {
                    queue.push_back(dep.id.clone());
                }
            }
        }

        Ok(g)
    }

    /// Detect cycles using DFS with colors.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::GraphCycle`] carrying the cycle path.
    pub fn detect_cycles(&self) -> Result<(), DepctxError> {
        let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
        let mut path: Vec<ResourceId> = Vec::new();

        for node in self.graph.node_indices() {
            colors.insert(node, Color::White);
        }

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                let chain =
                    cycle.iter().map(ResourceId::as_str).collect::<Vec<_>>().join(" -> ");
                return Err(DepctxError::GraphCycle {
                    chain,
                });
            }
        }

        Ok(())
    }

    /// DFS visit for cycle detection.
    ///
    /// Returns `Some(cycle_path)` if a cycle is detected, None otherwise.
    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<ResourceId>,
    ) -> Option<Vec<ResourceId>> {
        colors.insert(node, Color::Gray);
        path.push(self.graph[node].clone());

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let cycle_start =
                        path.iter().position(|n| *n == self.graph[neighbor]).unwrap_or(0);
                    let mut cycle = path[cycle_start..].to_vec();
                    // Repeat the entry node to show the cycle closes.
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Topological order with dependencies first.
    ///
    /// Kahn's algorithm with ties broken by catalog declaration ordinal, so
    /// the order is deterministic and stable across runs for identical
    /// catalogs.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::GraphCycle`] if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<ResourceId>, DepctxError> {
        self.detect_cycles()?;

        // pending[n] = number of dependencies of n not yet emitted.
        let mut pending: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ready: BTreeSet<(usize, NodeIndex)> = BTreeSet::new();

        for node in self.graph.node_indices() {
            let deps = self.graph.neighbors(node).count();
            pending.insert(node, deps);
            if deps == 0 {
                ready.insert((self.ordinal_of(node), node));
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(&(ordinal, node)) = ready.iter().next() {
            ready.remove(&(ordinal, node));
            order.push(self.graph[node].clone());

            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((self.ordinal_of(dependent), dependent));
                    }
                }
            }
        }

        Ok(order)
    }

    fn ordinal_of(&self, node: NodeIndex) -> usize {
        self.ordinals.get(&self.graph[node]).copied().unwrap_or(usize::MAX)
    }

    /// All nodes reachable from `id` via outgoing edges, excluding `id`.
    #[must_use]
    pub fn transitive_dependencies(&self, id: &ResourceId) -> HashSet<ResourceId> {
        let mut deps = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(&start) = self.node_map.get(id) {
            queue.push_back(start);
            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if deps.insert(self.graph[neighbor].clone()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        deps
    }

    /// Whether the graph contains the given resource.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.node_map.contains_key(id)
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Build a human-readable dependency tree rooted at `root`.
    #[must_use]
    pub fn to_tree_string(&self, root: &ResourceId) -> String {
        let mut result = String::new();
        let mut visited = HashSet::new();
        self.build_tree_string(root, &mut result, "", true, &mut visited);
        result
    }

    fn build_tree_string(
        &self,
        node: &ResourceId,
        result: &mut String,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<ResourceId>,
    ) {
        let connector = if is_last {
            "└── "
        } else {
            "├── "
        };
        result.push_str(&format!("{prefix}{connector}{node}\n"));

        if !visited.insert(node.clone()) {
            return;
        }

        let deps: Vec<ResourceId> = self
            .node_map
            .get(node)
            .map(|&idx| self.graph.neighbors(idx).map(|n| self.graph[n].clone()).collect())
            .unwrap_or_default();

        let child_prefix = if is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };

        for (i, dep) in deps.iter().enumerate() {
            let is_last_child = i == deps.len() - 1;
            self.build_tree_string(dep, result, &child_prefix, is_last_child, visited);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceDefinition;

    fn catalog(defs: Vec<ResourceDefinition>) -> ResourceCatalog {
        ResourceCatalog::new(defs).unwrap()
    }

    #[test]
    fn chain_topological_order() {
        // c depends on b depends on a
        let cat = catalog(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("c", "x").with_dependency("b", DependencyKind::Prerequisite),
        ]);
        let g = ResourceGraph::induced_prerequisites(&cat, &"c".into()).unwrap();
        assert_eq!(g.node_count(), 3);
        let order = g.topological_order().unwrap();
        assert_eq!(order, vec!["a".into(), "b".into(), "c".into()]);
    }

    #[test]
    fn diamond_is_deterministic() {
        // d depends on b and c; both depend on a.
        let cat = catalog(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("c", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("d", "x")
                .with_dependency("b", DependencyKind::Prerequisite)
                .with_dependency("c", DependencyKind::Prerequisite),
        ]);
        let g = ResourceGraph::induced_prerequisites(&cat, &"d".into()).unwrap();
        let order = g.topological_order().unwrap();
        // b and c tie; declaration order breaks it.
        assert_eq!(order, vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        // Stable across repeated computation.
        assert_eq!(order, g.topological_order().unwrap());
    }

    #[test]
    fn soft_edges_are_not_followed() {
        let cat = catalog(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("enhancer", "x"),
            ResourceDefinition::new("b", "x")
                .with_dependency("a", DependencyKind::Prerequisite)
                .with_dependency("enhancer", DependencyKind::ContextEnhancer),
        ]);
        let g = ResourceGraph::induced_prerequisites(&cat, &"b".into()).unwrap();
        assert!(!g.contains(&"enhancer".into()));
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn unknown_target_is_rejected() {
        let cat = catalog(vec![ResourceDefinition::new("a", "x")]);
        let err = ResourceGraph::induced_prerequisites(&cat, &"ghost".into()).unwrap_err();
        assert!(matches!(err, DepctxError::UnknownResource { id } if id == "ghost"));
    }

    #[test]
    fn transitive_dependencies_excludes_self() {
        let cat = catalog(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
            ResourceDefinition::new("c", "x").with_dependency("b", DependencyKind::Prerequisite),
        ]);
        let g = ResourceGraph::induced_prerequisites(&cat, &"c".into()).unwrap();
        let deps = g.transitive_dependencies(&"c".into());
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&ResourceId::from("a")) && deps.contains(&ResourceId::from("b")));
        assert!(!deps.contains(&ResourceId::from("c")));
    }

    #[test]
    fn empty_graph_is_fine() {
        let g = ResourceGraph::empty();
        assert!(g.detect_cycles().is_ok());
        assert!(g.topological_order().unwrap().is_empty());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn tree_string_renders_hierarchy() {
        let cat = catalog(vec![
            ResourceDefinition::new("a", "x"),
            ResourceDefinition::new("b", "x").with_dependency("a", DependencyKind::Prerequisite),
        ]);
        let g = ResourceGraph::induced_prerequisites(&cat, &"b".into()).unwrap();
        let tree = g.to_tree_string(&"b".into());
        assert!(tree.contains("b"));
        assert!(tree.contains("└── a"));
    }
}
