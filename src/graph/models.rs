//! Projection types for the in-process algorithms.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Projection: petgraph wrapper with ID mapping
// ============================================================================

/// Directed, weighted projection of an induced subgraph.
///
/// Node weights are store identifiers, edge weights are relationship weights
/// (1.0 when unweighted). `id_to_index` gives O(1) lookup by identifier.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub graph: DiGraph<String, f64>,
    pub id_to_index: HashMap<String, NodeIndex>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. An identifier already present keeps its index.
    pub fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.id_to_index.insert(id.to_string(), idx);
        idx
    }

    /// Add an edge between two projected nodes. `None` if either is missing.
    pub fn add_edge(&mut self, from_id: &str, to_id: &str, weight: f64) -> Option<EdgeIndex> {
        let from = *self.id_to_index.get(from_id)?;
        let to = *self.id_to_index.get(to_id)?;
        Some(self.graph.add_edge(from, to, weight))
    }

    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

// ============================================================================
// Settings and outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankSettings {
    pub damping: f64,
    pub max_iterations: u32,
    /// L1 change between iterations under which the iteration stops.
    pub tolerance: f64,
    /// Split a node's rank proportionally to edge weight instead of evenly.
    pub weighted: bool,
}

impl Default for PageRankSettings {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 20,
            tolerance: 1e-7,
            weighted: false,
        }
    }
}

/// Result of a label propagation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPropagationOutcome {
    /// Community label per node, numbered `0..community_count`.
    pub labels: HashMap<String, u64>,
    pub community_count: usize,
    pub ran_iterations: u32,
    pub did_converge: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_is_idempotent() {
        let mut p = Projection::new();
        let a = p.add_node("a");
        assert_eq!(p.add_node("a"), a);
        assert_eq!(p.node_count(), 1);
    }

    #[test]
    fn test_add_edge_requires_both_endpoints() {
        let mut p = Projection::new();
        p.add_node("a");
        assert!(p.add_edge("a", "b", 1.0).is_none());
        p.add_node("b");
        assert!(p.add_edge("a", "b", 2.0).is_some());
        assert_eq!(p.edge_count(), 1);
    }
}
