//! Graph algorithms over a [`Projection`].
//!
//! - **PageRank**: power iteration, optionally weighted
//! - **Betweenness centrality**: via `rustworkx_core::centrality::betweenness_centrality`
//! - **Label propagation**: deterministic, weighted, on the undirected view
//!
//! All algorithms return results keyed by node identifier.

use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

use super::models::{LabelPropagationOutcome, PageRankSettings, Projection};

// ============================================================================
// PageRank (power iteration)
// ============================================================================

/// Compute PageRank scores for all nodes in the projection.
///
/// Scores are normalized to sum to 1.0. Dangling nodes spread their rank
/// evenly over all nodes.
pub fn pagerank(projection: &Projection, settings: &PageRankSettings) -> HashMap<String, f64> {
    let g = &projection.graph;
    let n = g.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let damping = settings.damping;
    let mut scores: Vec<f64> = vec![1.0 / n as f64; n];
    let mut new_scores: Vec<f64> = vec![0.0; n];

    let edge_weight = |w: f64| if settings.weighted { w.max(0.0) } else { 1.0 };
    let out_strength: Vec<f64> = g
        .node_indices()
        .map(|idx| {
            g.edges_directed(idx, Direction::Outgoing)
                .map(|e| edge_weight(*e.weight()))
                .sum()
        })
        .collect();

    for _ in 0..settings.max_iterations {
        for s in new_scores.iter_mut() {
            *s = (1.0 - damping) / n as f64;
        }

        for idx in g.node_indices() {
            let i = idx.index();
            if out_strength[i] > 0.0 {
                let share = damping * scores[i] / out_strength[i];
                for edge in g.edges_directed(idx, Direction::Outgoing) {
                    new_scores[edge.target().index()] += share * edge_weight(*edge.weight());
                }
            } else {
                let contribution = damping * scores[i] / n as f64;
                for s in new_scores.iter_mut() {
                    *s += contribution;
                }
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(new_scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        std::mem::swap(&mut scores, &mut new_scores);

        if diff < settings.tolerance {
            break;
        }
    }

    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    }

    g.node_indices()
        .map(|idx| (g[idx].clone(), scores[idx.index()]))
        .collect()
}

// ============================================================================
// Betweenness Centrality (via rustworkx-core)
// ============================================================================

/// Unnormalized betweenness centrality on the directed projection.
///
/// Shortest paths are counted in hops; edge weights are ignored.
pub fn betweenness_centrality(projection: &Projection) -> HashMap<String, f64> {
    let g = &projection.graph;
    if g.node_count() == 0 {
        return HashMap::new();
    }

    let scores = rustworkx_core::centrality::betweenness_centrality(
        g, false, // include_endpoints
        false, // normalized
        200,   // parallel_threshold
    );

    g.node_indices()
        .map(|idx| (g[idx].clone(), scores[idx.index()].unwrap_or(0.0)))
        .collect()
}

// ============================================================================
// Label propagation
// ============================================================================

/// Detect communities by label propagation.
///
/// Every node starts in its own community. Nodes are visited in insertion
/// order and adopt the label carrying the largest total edge weight among
/// their neighbours; a node keeps its label when it is among the best, and
/// otherwise ties go to the smallest label. Stops when a full pass changes
/// nothing or after `max_iterations` passes. Labels are renumbered from 0 in
/// order of first appearance.
pub fn label_propagation(projection: &Projection, max_iterations: u32) -> LabelPropagationOutcome {
    let g = &projection.graph;
    let n = g.node_count();

    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for edge in g.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        if a == b {
            continue;
        }
        adjacency[a].push((b, *edge.weight()));
        adjacency[b].push((a, *edge.weight()));
    }

    let mut labels: Vec<usize> = (0..n).collect();
    let mut ran_iterations = 0;
    let mut did_converge = false;

    while ran_iterations < max_iterations {
        ran_iterations += 1;
        let mut changed = false;

        for i in 0..n {
            if adjacency[i].is_empty() {
                continue;
            }
            let mut votes: BTreeMap<usize, f64> = BTreeMap::new();
            for &(j, w) in &adjacency[i] {
                *votes.entry(labels[j]).or_insert(0.0) += w;
            }
            let best = votes.values().cloned().fold(f64::NEG_INFINITY, f64::max);
            if votes.get(&labels[i]).is_some_and(|&w| w >= best) {
                continue;
            }
            if let Some((&label, _)) = votes.iter().find(|(_, &w)| w >= best) {
                labels[i] = label;
                changed = true;
            }
        }

        if !changed {
            did_converge = true;
            break;
        }
    }

    // Contiguous renumbering
    let mut renumbered: HashMap<usize, u64> = HashMap::new();
    let mut result = HashMap::with_capacity(n);
    for idx in g.node_indices() {
        let next = renumbered.len() as u64;
        let label = *renumbered.entry(labels[idx.index()]).or_insert(next);
        result.insert(g[idx].clone(), label);
    }

    LabelPropagationOutcome {
        labels: result,
        community_count: renumbered.len(),
        ran_iterations,
        did_converge,
    }
}
