//! Turns a [`SubgraphSpec`] into [`Request`]s with induced-subgraph semantics.
//!
//! The node filter is written once, against `n`. Whenever a request traverses
//! a relationship the builder binds a copy of it to the neighbour variable `m`,
//! so an edge only counts when *both* endpoints pass the filter.

use super::{Algorithm, Direction, Request, SubgraphSpec};
use crate::predicate::{Predicate, PredicateRewriter, NEIGHBOR_VARIABLE};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct SubgraphQueryBuilder {
    rewriter: PredicateRewriter,
}

impl SubgraphQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node filter rebound to the neighbour variable.
    pub fn neighbor_node_filter(&self, node_filter: &Predicate) -> Predicate {
        self.rewriter.bind(node_filter, NEIGHBOR_VARIABLE)
    }

    /// Filter over `n`, `m`, `r` selecting the edges of the induced subgraph.
    pub fn pattern_filter(&self, spec: &SubgraphSpec) -> Predicate {
        PredicateRewriter::combine([
            spec.node_filter.clone(),
            self.neighbor_node_filter(&spec.node_filter),
            spec.edge_filter.clone(),
        ])
    }

    /// Filter on the neighbour and relationship of an already-filtered `n`.
    pub fn neighbor_filter(&self, spec: &SubgraphSpec) -> Predicate {
        PredicateRewriter::combine([
            self.neighbor_node_filter(&spec.node_filter),
            spec.edge_filter.clone(),
        ])
    }

    /// Count of nodes satisfying `node_filter`.
    pub fn node_count_query(&self, node_filter: &Predicate) -> Request {
        Request::NodeCount {
            filter: node_filter.clone(),
        }
    }

    /// `(source, target, weight)` of every induced edge.
    ///
    /// Each physical edge is listed once with its stored orientation whatever
    /// `spec.direction` is; direction only matters for per-node aggregates.
    pub fn induced_edge_query(&self, spec: &SubgraphSpec, weight: Option<&str>) -> Request {
        Request::EdgeList {
            filter: self.pattern_filter(spec),
            weight: weight.map(str::to_string),
        }
    }

    /// Edge count (or weight sum) over the induced subgraph.
    pub fn edge_total_query(&self, spec: &SubgraphSpec, weight: Option<&str>) -> Request {
        Request::EdgeTotal {
            filter: self.pattern_filter(spec),
            weight: weight.map(str::to_string),
        }
    }

    /// Per-node degree (or strength) in `spec.direction`, zero-degree nodes included.
    pub fn per_node_degree_query(&self, spec: &SubgraphSpec, weight: Option<&str>) -> Request {
        Request::NodeDegrees {
            node_filter: spec.node_filter.clone(),
            neighbor_filter: self.neighbor_filter(spec),
            direction: spec.direction,
            weight: weight.map(str::to_string),
        }
    }

    pub fn property_pairs_query(
        &self,
        node_filter: &Predicate,
        first: &str,
        second: &str,
    ) -> Request {
        Request::PropertyPairs {
            filter: node_filter.clone(),
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn property_cooccurrence_query(
        &self,
        node_filter: &Predicate,
        first: &str,
        second: &str,
    ) -> Request {
        Request::PropertyCooccurrence {
            filter: node_filter.clone(),
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    /// Per-community internal edge weight `e_c`.
    pub fn community_internal_query(
        &self,
        spec: &SubgraphSpec,
        community_property: &str,
        weight: Option<&str>,
    ) -> Request {
        Request::CommunityInternalWeight {
            community_property: community_property.to_string(),
            filter: self.pattern_filter(spec),
            weight: weight.map(str::to_string),
        }
    }

    /// Per-community induced degree sum `a_c`. Always `BOTH` direction.
    pub fn community_degree_query(
        &self,
        spec: &SubgraphSpec,
        community_property: &str,
        weight: Option<&str>,
    ) -> Request {
        Request::CommunityDegree {
            community_property: community_property.to_string(),
            node_filter: spec.node_filter.clone(),
            neighbor_filter: self.neighbor_filter(spec),
            weight: weight.map(str::to_string),
        }
    }

    /// Native algorithm over the induced subgraph. Projections are directed
    /// (`OUT`), one relationship per physical edge.
    pub fn algorithm_query(
        &self,
        spec: &SubgraphSpec,
        algorithm: Algorithm,
        weight: Option<&str>,
    ) -> Request {
        let projected = spec.clone().with_direction(Direction::Out);
        Request::Algorithm {
            algorithm,
            node_filter: projected.node_filter.clone(),
            neighbor_filter: self.neighbor_filter(&projected),
            weight: weight.map(str::to_string),
        }
    }

    pub fn set_property_query(&self, property: &str, ids: Vec<String>, value: Value) -> Request {
        Request::SetNodeProperty {
            property: property.to_string(),
            ids,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(node: &str, edge: &str) -> SubgraphSpec {
        SubgraphSpec::parse(Some(node), Some(edge)).unwrap()
    }

    #[test]
    fn test_pattern_filter_binds_node_filter_to_both_endpoints() {
        let builder = SubgraphQueryBuilder::new();
        let filter = builder.pattern_filter(&spec("n.age > 20", "r.weight > 0.5"));
        assert_eq!(
            filter.to_string(),
            "n.age > 20 AND m.age > 20 AND r.weight > 0.5"
        );
    }

    #[test]
    fn test_no_filters_yield_neutral_predicates() {
        let builder = SubgraphQueryBuilder::new();
        let all = SubgraphSpec::all();
        assert!(builder.pattern_filter(&all).is_true());
        assert!(builder.neighbor_filter(&all).is_true());
    }

    #[test]
    fn test_per_node_degree_query_carries_direction_and_neighbor_filter() {
        let builder = SubgraphQueryBuilder::new();
        let s = spec("n.kind = 'a'", "").with_direction(Direction::In);
        match builder.per_node_degree_query(&s, Some("w")) {
            Request::NodeDegrees {
                node_filter,
                neighbor_filter,
                direction,
                weight,
            } => {
                assert_eq!(node_filter.to_string(), "n.kind = 'a'");
                assert_eq!(neighbor_filter.to_string(), "m.kind = 'a'");
                assert_eq!(direction, Direction::In);
                assert_eq!(weight.as_deref(), Some("w"));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_algorithm_query_projects_outgoing_edges() {
        let builder = SubgraphQueryBuilder::new();
        let s = spec("n.active", "").with_direction(Direction::In);
        match builder.algorithm_query(&s, Algorithm::Betweenness, None) {
            Request::Algorithm {
                node_filter,
                neighbor_filter,
                ..
            } => {
                assert_eq!(node_filter.to_string(), "n.active");
                assert_eq!(neighbor_filter.to_string(), "m.active");
            }
            other => panic!("unexpected request {:?}", other),
        }
    }
}
