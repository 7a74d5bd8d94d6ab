//! Subgraph specifications and structured aggregation requests.
//!
//! Statistics never assemble query text themselves. They describe what they
//! need as a [`Request`] built by [`SubgraphQueryBuilder`], which is where the
//! node filter is propagated to every endpoint a traversal touches. Adapters
//! either render the request to Cypher ([`cypher`]) or evaluate it natively.
//!
//! ## Variables
//!
//! Every predicate inside a request uses the same variable names:
//! `n` for the queried node (or edge source), `m` for the neighbour (or edge
//! target) and `r` for the relationship.

pub mod builder;
pub mod cypher;

pub use builder::SubgraphQueryBuilder;
pub use cypher::{CypherPlan, Statement};

use crate::error::Result;
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Subgraph specification
// ============================================================================

/// Which incident relationships count towards a node's degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Relationships where the node is the target.
    In,
    /// Relationships where the node is the source.
    Out,
    /// Relationships incident in either role, each physical edge once.
    #[default]
    Both,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
            Self::Both => write!(f, "BOTH"),
        }
    }
}

/// `{nodeFilter, edgeFilter, direction}`: the induced subgraph a statistic
/// is computed over.
///
/// An edge belongs to the subgraph iff `edge_filter` holds for it and both of
/// its endpoints satisfy `node_filter`. A missing filter is [`Predicate::True`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubgraphSpec {
    /// Written against `n`.
    pub node_filter: Predicate,
    /// Written against `r`.
    pub edge_filter: Predicate,
    pub direction: Direction,
}

impl SubgraphSpec {
    /// The whole graph, `BOTH` direction.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse optional textual filters. `None` and blank strings mean "no filter".
    pub fn parse(node_filter: Option<&str>, edge_filter: Option<&str>) -> Result<Self> {
        Ok(Self {
            node_filter: node_filter.map(Predicate::parse).transpose()?.unwrap_or_default(),
            edge_filter: edge_filter.map(Predicate::parse).transpose()?.unwrap_or_default(),
            direction: Direction::Both,
        })
    }

    pub fn with_node_filter(mut self, filter: Predicate) -> Self {
        self.node_filter = filter;
        self
    }

    pub fn with_edge_filter(mut self, filter: Predicate) -> Self {
        self.edge_filter = filter;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Native graph algorithm to run over a projected induced subgraph.
#[derive(Debug, Clone, PartialEq)]
pub enum Algorithm {
    PageRank { damping: f64, iterations: u32 },
    Betweenness,
    /// Writes the community label of every projected node to `write_property`.
    LabelPropagation {
        write_property: String,
        max_iterations: u32,
    },
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PageRank { .. } => "pageRank",
            Self::Betweenness => "betweenness",
            Self::LabelPropagation { .. } => "labelPropagation",
        }
    }
}

/// A structured aggregation request.
///
/// Each variant documents the columns of the rows it yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// `count`: number of nodes satisfying `filter` (over `n`).
    NodeCount { filter: Predicate },

    /// `total`: number of edges `(n)-[r]->(m)` satisfying `filter`, or the sum
    /// of `weight` over them (missing weights count as zero).
    EdgeTotal {
        filter: Predicate,
        weight: Option<String>,
    },

    /// `source`, `target`, `weight`: every edge `(n)-[r]->(m)` satisfying `filter`.
    EdgeList {
        filter: Predicate,
        weight: Option<String>,
    },

    /// `id`, `degree`: for every node satisfying `node_filter`, the count (or
    /// weight sum) of distinct relationships in `direction` whose neighbour and
    /// relationship satisfy `neighbor_filter` (over `n`, `m`, `r`). Nodes with
    /// no such relationship are reported with degree 0.
    NodeDegrees {
        node_filter: Predicate,
        neighbor_filter: Predicate,
        direction: Direction,
        weight: Option<String>,
    },

    /// `first`, `second`: both properties of every node satisfying `filter`
    /// where neither is null.
    PropertyPairs {
        filter: Predicate,
        first: String,
        second: String,
    },

    /// `first`, `second`, `count`: co-occurrence counts of two node properties.
    PropertyCooccurrence {
        filter: Predicate,
        first: String,
        second: String,
    },

    /// `community`, `weight`: per community, count (or weight sum) of edges
    /// satisfying `filter` whose endpoints share the community value.
    CommunityInternalWeight {
        community_property: String,
        filter: Predicate,
        weight: Option<String>,
    },

    /// `community`, `degree`: per community, the sum of the `BOTH` degrees of
    /// its nodes, degrees computed as in [`Request::NodeDegrees`].
    CommunityDegree {
        community_property: String,
        node_filter: Predicate,
        neighbor_filter: Predicate,
        weight: Option<String>,
    },

    /// `updated`: set `property` to `value` on the nodes with the given ids.
    SetNodeProperty {
        property: String,
        ids: Vec<String>,
        value: Value,
    },

    /// Native algorithm over the subgraph induced by `node_filter` (over `n`)
    /// and `neighbor_filter` (over `n`, `m`, `r`).
    ///
    /// Scoring algorithms yield `id`, `score`. Label propagation yields
    /// `nodeCount`, `communityCount`, `ranIterations`, `didConverge`.
    Algorithm {
        algorithm: Algorithm,
        node_filter: Predicate,
        neighbor_filter: Predicate,
        weight: Option<String>,
    },
}

impl Request {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeCount { .. } => "node_count",
            Self::EdgeTotal { .. } => "edge_total",
            Self::EdgeList { .. } => "edge_list",
            Self::NodeDegrees { .. } => "node_degrees",
            Self::PropertyPairs { .. } => "property_pairs",
            Self::PropertyCooccurrence { .. } => "property_cooccurrence",
            Self::CommunityInternalWeight { .. } => "community_internal_weight",
            Self::CommunityDegree { .. } => "community_degree",
            Self::SetNodeProperty { .. } => "set_node_property",
            Self::Algorithm { .. } => "algorithm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_parse_treats_missing_and_blank_alike() {
        let a = SubgraphSpec::parse(None, None).unwrap();
        let b = SubgraphSpec::parse(Some(""), Some("true")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, SubgraphSpec::all());
    }

    #[test]
    fn test_spec_parse_rejects_malformed_filter() {
        assert!(SubgraphSpec::parse(Some("n.age >"), None).is_err());
    }

    #[test]
    fn test_direction_serde_uppercase() {
        let d: Direction = serde_json::from_str("\"OUT\"").unwrap();
        assert_eq!(d, Direction::Out);
        assert_eq!(Direction::default(), Direction::Both);
        assert_eq!(Direction::In.to_string(), "IN");
    }
}
