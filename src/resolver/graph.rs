//! Dependency graph of accepted bundles
//!
//! Nodes own their manifest; edges are indices into the node list, so a
//! dependency is a direct reference to the accepted manifest rather than a
//! name that has to be looked up again.
//!
//! ```text
//! nodes: [ 0: timers, 1: clock, 2: scoreboard ]
//!            ↑           │            │
//!            └───────────┴────────────┘   dependencies: clock → [0], scoreboard → [0]
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::manifest::Manifest;

/// A bundle in the graph with its resolved dependency edges
#[derive(Debug, Clone)]
pub struct BundleNode {
    pub manifest: Arc<Manifest>,
    /// Indices of dependencies, in declaration (name) order
    pub dependencies: Vec<usize>,
}

/// Accepted manifests plus resolved dependency edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<BundleNode>,
}

impl DependencyGraph {
    /// Build the graph from manifests whose dependencies are all present
    ///
    /// Dependency names that do not match a manifest in the set are dropped;
    /// the resolver guarantees there are none.
    pub fn from_accepted(manifests: Vec<Manifest>) -> Self {
        let index: HashMap<String, usize> = manifests
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();

        let nodes = manifests
            .into_iter()
            .map(|manifest| {
                let dependencies = manifest
                    .dependencies
                    .keys()
                    .filter_map(|dep| index.get(dep).copied())
                    .collect();
                BundleNode {
                    manifest: Arc::new(manifest),
                    dependencies,
                }
            })
            .collect();

        Self { nodes }
    }

    pub fn nodes(&self) -> &[BundleNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&BundleNode> {
        self.nodes.get(index)
    }

    /// Bundle names in insertion order
    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.manifest.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_fixtures::manifest;

    #[test]
    fn test_edges_are_indices() {
        let graph = DependencyGraph::from_accepted(vec![
            manifest("timers", "1.0.0", &[]),
            manifest("clock", "1.0.0", &[("timers", "^1.0")]),
        ]);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.names(), vec!["timers", "clock"]);
        let clock = graph.node(1).expect("clock node");
        assert_eq!(clock.dependencies, vec![0]);
    }

    #[test]
    fn test_edges_follow_name_order() {
        let graph = DependencyGraph::from_accepted(vec![
            manifest("zeta", "1.0.0", &[]),
            manifest("alpha", "1.0.0", &[]),
            manifest("app", "1.0.0", &[("zeta", "*"), ("alpha", "*")]),
        ]);

        let app = graph.node(2).expect("app node");
        assert_eq!(app.dependencies, vec![1, 0]);
    }

    #[test]
    fn test_unknown_dependencies_dropped() {
        let graph =
            DependencyGraph::from_accepted(vec![manifest("lonely", "1.0.0", &[("ghost", "*")])]);
        assert!(graph.node(0).expect("node").dependencies.is_empty());
    }
}
