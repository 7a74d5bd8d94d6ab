//! In-memory property graph adapter.
//!
//! Evaluates [`Request`]s directly over nodes and relationships held in
//! `tokio::sync::RwLock` collections, with the same semantics as their Cypher
//! rendering. Native algorithms run on a petgraph projection of the induced
//! subgraph. Raw Cypher is not supported.

use super::traits::{EdgeRecord, GraphAdapter, NodeRecord, Row};
use crate::error::{HypographError, Result};
use crate::graph::{self, PageRankSettings, Projection};
use crate::predicate::{
    value_key, Bindings, EntityRef, Predicate, EDGE_VARIABLE, NEIGHBOR_VARIABLE, NODE_VARIABLE,
};
use crate::query::{Algorithm, Direction, Request};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory property graph.
///
/// # Example
///
/// ```rust
/// use hypograph::adapter::{EdgeRecord, MemoryGraph, NodeRecord};
/// use hypograph::{StructuralStatistics, SubgraphSpec};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let graph = MemoryGraph::new();
/// graph.add_node(NodeRecord::new("a", &["City"], json!({"size": 3}))).await;
/// graph.add_node(NodeRecord::new("b", &["City"], json!({"size": 8}))).await;
/// graph
///     .add_edge(EdgeRecord::new("ab", "ROAD", "a", "b", json!({})))
///     .await
///     .unwrap();
///
/// let stats = StructuralStatistics::new(Arc::new(graph));
/// let density = stats.density(&SubgraphSpec::all(), None).await.unwrap();
/// assert_eq!(density, 1.0);
///
/// // an edge only counts when both endpoints pass the node filter
/// let spec = SubgraphSpec::parse(Some("n.size > 5"), None).unwrap();
/// assert_eq!(stats.density(&spec, None).await.unwrap(), 0.0);
/// # });
/// ```
pub struct MemoryGraph {
    nodes: RwLock<BTreeMap<String, NodeRecord>>,
    edges: RwLock<Vec<EdgeRecord>>,
    native_algorithms: bool,
    closed: AtomicBool,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRecord {
    /// `properties` must be a JSON object; anything else yields no properties.
    pub fn new(id: impl Into<String>, labels: &[&str], properties: Value) -> Self {
        Self {
            id: id.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: into_map(properties),
        }
    }
}

impl EdgeRecord {
    pub fn new(
        id: impl Into<String>,
        rel_type: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        properties: Value,
    ) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            source: source.into(),
            target: target.into(),
            properties: into_map(properties),
        }
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl MemoryGraph {
    /// Create an empty graph with native algorithms enabled.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            edges: RwLock::new(Vec::new()),
            native_algorithms: true,
            closed: AtomicBool::new(false),
        }
    }

    /// Build a graph from records. Fails if an edge references an unknown node.
    pub fn from_records(nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> Result<Self> {
        let nodes: BTreeMap<String, NodeRecord> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        for edge in &edges {
            check_endpoints(&nodes, edge)?;
        }
        Ok(Self {
            nodes: RwLock::new(nodes),
            edges: RwLock::new(edges),
            ..Self::new()
        })
    }

    /// Report native algorithms as unavailable, like a store without GDS.
    pub fn without_native_algorithms(mut self) -> Self {
        self.native_algorithms = false;
        self
    }

    pub async fn add_node(&self, node: NodeRecord) {
        self.nodes.write().await.insert(node.id.clone(), node);
    }

    pub async fn add_edge(&self, edge: EdgeRecord) -> Result<()> {
        check_endpoints(&*self.nodes.read().await, &edge)?;
        self.edges.write().await.push(edge);
        Ok(())
    }

    /// Current value of a node property, if the node and property exist.
    pub async fn node_property(&self, id: &str, key: &str) -> Option<Value> {
        self.nodes
            .read()
            .await
            .get(id)
            .and_then(|n| n.properties.get(key).cloned())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(HypographError::Connection("adapter is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

fn check_endpoints(nodes: &BTreeMap<String, NodeRecord>, edge: &EdgeRecord) -> Result<()> {
    for endpoint in [&edge.source, &edge.target] {
        if !nodes.contains_key(endpoint) {
            return Err(HypographError::Query(format!(
                "edge {} references unknown node {}",
                edge.id, endpoint
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Evaluation
// ============================================================================

/// `n`, `m`, `r` bound to records.
#[derive(Default)]
struct Scope<'a> {
    node: Option<&'a NodeRecord>,
    neighbor: Option<&'a NodeRecord>,
    edge: Option<&'a EdgeRecord>,
}

impl<'a> Scope<'a> {
    fn node(node: &'a NodeRecord) -> Self {
        Self {
            node: Some(node),
            ..Self::default()
        }
    }

    fn traversal(node: &'a NodeRecord, edge: &'a EdgeRecord, neighbor: &'a NodeRecord) -> Self {
        Self {
            node: Some(node),
            neighbor: Some(neighbor),
            edge: Some(edge),
        }
    }
}

impl Bindings for Scope<'_> {
    fn entity(&self, variable: &str) -> Option<EntityRef<'_>> {
        match variable {
            NODE_VARIABLE => self.node.map(node_entity),
            NEIGHBOR_VARIABLE => self.neighbor.map(node_entity),
            EDGE_VARIABLE => self.edge.map(|e| EntityRef {
                labels: std::slice::from_ref(&e.rel_type),
                properties: &e.properties,
            }),
            _ => None,
        }
    }
}

fn node_entity(node: &NodeRecord) -> EntityRef<'_> {
    EntityRef {
        labels: &node.labels,
        properties: &node.properties,
    }
}

/// Numeric property, `None` when missing or not a number.
fn numeric(properties: &Map<String, Value>, key: &str) -> Option<f64> {
    properties.get(key).and_then(Value::as_f64)
}

/// Count (as an integer) or weight sum (as a float) in the shape Cypher returns.
fn total_value(count: usize, sum: f64, weight: &Option<String>) -> Value {
    match weight {
        Some(_) => json!(sum),
        None => json!(count),
    }
}

struct Snapshot<'a> {
    nodes: &'a BTreeMap<String, NodeRecord>,
    edges: &'a [EdgeRecord],
}

impl<'a> Snapshot<'a> {
    /// Induced edges `(n)-[r]->(m)` satisfying `filter`.
    fn matching_edges<'s>(
        &'s self,
        filter: &'s Predicate,
    ) -> impl Iterator<Item = (&'a NodeRecord, &'a EdgeRecord, &'a NodeRecord)> + 's {
        self.edges.iter().filter_map(move |edge| {
            let source = self.nodes.get(&edge.source)?;
            let target = self.nodes.get(&edge.target)?;
            filter
                .matches(&Scope::traversal(source, edge, target))
                .then_some((source, edge, target))
        })
    }

    /// Distinct relationships incident to `node` in `direction` whose
    /// neighbour and relationship satisfy `neighbor_filter`.
    fn incident(
        &self,
        node: &'a NodeRecord,
        direction: Direction,
        neighbor_filter: &Predicate,
    ) -> Vec<&'a EdgeRecord> {
        self.edges
            .iter()
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Out if edge.source == node.id => &edge.target,
                    Direction::In if edge.target == node.id => &edge.source,
                    Direction::Both if edge.source == node.id => &edge.target,
                    Direction::Both if edge.target == node.id => &edge.source,
                    _ => return None,
                };
                let neighbor = self.nodes.get(other)?;
                neighbor_filter
                    .matches(&Scope::traversal(node, edge, neighbor))
                    .then_some(edge)
            })
            .collect()
    }

    fn degree(&self, rels: &[&EdgeRecord], weight: &Option<String>) -> Value {
        let sum = weight
            .as_deref()
            .map(|w| rels.iter().filter_map(|r| numeric(&r.properties, w)).sum())
            .unwrap_or(0.0);
        total_value(rels.len(), sum, weight)
    }

    fn filtered_nodes<'s>(
        &'s self,
        filter: &'s Predicate,
    ) -> impl Iterator<Item = &'a NodeRecord> + 's {
        self.nodes
            .values()
            .filter(move |n| filter.matches(&Scope::node(n)))
    }

    fn project(
        &self,
        node_filter: &Predicate,
        neighbor_filter: &Predicate,
        weight: Option<&str>,
    ) -> Projection {
        let mut projection = Projection::new();
        let members: Vec<&NodeRecord> = self.filtered_nodes(node_filter).collect();
        for &node in &members {
            projection.add_node(&node.id);
        }
        for &node in &members {
            for edge in self.incident(node, Direction::Out, neighbor_filter) {
                let w = weight
                    .and_then(|w| numeric(&edge.properties, w))
                    .unwrap_or(1.0);
                projection.add_edge(&edge.source, &edge.target, w);
            }
        }
        projection
    }
}

fn row(value: Value) -> Row {
    into_map(value)
}

#[async_trait]
impl GraphAdapter for MemoryGraph {
    async fn query(&self, _text: &str, _params: &Map<String, Value>) -> Result<Vec<Row>> {
        self.ensure_open()?;
        Err(HypographError::Query(
            "the in-memory adapter does not evaluate raw Cypher".to_string(),
        ))
    }

    async fn execute(&self, request: &Request) -> Result<Vec<Row>> {
        self.ensure_open()?;
        debug!(kind = request.kind(), "Evaluating request in memory");

        if let Request::SetNodeProperty {
            property,
            ids,
            value,
        } = request
        {
            let mut nodes = self.nodes.write().await;
            let mut updated = 0usize;
            for id in ids {
                if let Some(node) = nodes.get_mut(id) {
                    node.properties.insert(property.clone(), value.clone());
                    updated += 1;
                }
            }
            return Ok(vec![row(json!({ "updated": updated }))]);
        }

        if let Request::Algorithm {
            algorithm: Algorithm::LabelPropagation {
                write_property,
                max_iterations,
            },
            node_filter,
            neighbor_filter,
            weight,
        } = request
        {
            if !self.native_algorithms {
                return Err(HypographError::CapabilityUnavailable(
                    "labelPropagation".to_string(),
                ));
            }
            let outcome = {
                let nodes = self.nodes.read().await;
                let edges = self.edges.read().await;
                let snapshot = Snapshot {
                    nodes: &nodes,
                    edges: &edges,
                };
                let projection = snapshot.project(node_filter, neighbor_filter, weight.as_deref());
                graph::label_propagation(&projection, *max_iterations)
            };
            let mut nodes = self.nodes.write().await;
            for (id, label) in &outcome.labels {
                if let Some(node) = nodes.get_mut(id) {
                    node.properties.insert(write_property.clone(), json!(label));
                }
            }
            return Ok(vec![row(json!({
                "nodeCount": outcome.labels.len(),
                "communityCount": outcome.community_count,
                "ranIterations": outcome.ran_iterations,
                "didConverge": outcome.did_converge,
            }))]);
        }

        let nodes = self.nodes.read().await;
        let edges = self.edges.read().await;
        let snapshot = Snapshot {
            nodes: &nodes,
            edges: &edges,
        };

        let rows = match request {
            Request::NodeCount { filter } => {
                vec![row(json!({ "count": snapshot.filtered_nodes(filter).count() }))]
            }

            Request::EdgeTotal { filter, weight } => {
                let mut count = 0usize;
                let mut sum = 0.0;
                for (_, edge, _) in snapshot.matching_edges(filter) {
                    count += 1;
                    if let Some(w) = weight {
                        sum += numeric(&edge.properties, w).unwrap_or(0.0);
                    }
                }
                vec![row(json!({ "total": total_value(count, sum, weight) }))]
            }

            Request::EdgeList { filter, weight } => snapshot
                .matching_edges(filter)
                .map(|(n, edge, m)| {
                    let w = match weight {
                        Some(w) => json!(numeric(&edge.properties, w)),
                        None => json!(1.0),
                    };
                    row(json!({ "source": n.id, "target": m.id, "weight": w }))
                })
                .collect(),

            Request::NodeDegrees {
                node_filter,
                neighbor_filter,
                direction,
                weight,
            } => snapshot
                .filtered_nodes(node_filter)
                .map(|n| {
                    let rels = snapshot.incident(n, *direction, neighbor_filter);
                    row(json!({ "id": n.id, "degree": snapshot.degree(&rels, weight) }))
                })
                .collect(),

            Request::PropertyPairs {
                filter,
                first,
                second,
            } => snapshot
                .filtered_nodes(filter)
                .filter_map(|n| {
                    let a = n.properties.get(first).filter(|v| !v.is_null())?;
                    let b = n.properties.get(second).filter(|v| !v.is_null())?;
                    Some(row(json!({ "first": a, "second": b })))
                })
                .collect(),

            Request::PropertyCooccurrence {
                filter,
                first,
                second,
            } => {
                let mut groups: BTreeMap<(String, String), (Value, Value, usize)> = BTreeMap::new();
                for n in snapshot.filtered_nodes(filter) {
                    let (Some(a), Some(b)) = (
                        n.properties.get(first).filter(|v| !v.is_null()),
                        n.properties.get(second).filter(|v| !v.is_null()),
                    ) else {
                        continue;
                    };
                    groups
                        .entry((value_key(a), value_key(b)))
                        .or_insert_with(|| (a.clone(), b.clone(), 0))
                        .2 += 1;
                }
                groups
                    .into_values()
                    .map(|(a, b, count)| row(json!({ "first": a, "second": b, "count": count })))
                    .collect()
            }

            Request::CommunityInternalWeight {
                community_property,
                filter,
                weight,
            } => {
                let mut groups: BTreeMap<String, (Value, usize, f64)> = BTreeMap::new();
                for (n, edge, m) in snapshot.matching_edges(filter) {
                    let Some(c) = n.properties.get(community_property).filter(|v| !v.is_null())
                    else {
                        continue;
                    };
                    let key = value_key(c);
                    if m.properties.get(community_property).map(value_key).as_ref() != Some(&key) {
                        continue;
                    }
                    let entry = groups
                        .entry(key)
                        .or_insert_with(|| (c.clone(), 0, 0.0));
                    entry.1 += 1;
                    if let Some(w) = weight {
                        entry.2 += numeric(&edge.properties, w).unwrap_or(0.0);
                    }
                }
                groups
                    .into_values()
                    .map(|(c, count, sum)| {
                        row(json!({ "community": c, "weight": total_value(count, sum, weight) }))
                    })
                    .collect()
            }

            Request::CommunityDegree {
                community_property,
                node_filter,
                neighbor_filter,
                weight,
            } => {
                let mut groups: BTreeMap<String, (Value, usize, f64)> = BTreeMap::new();
                for n in snapshot.filtered_nodes(node_filter) {
                    let Some(c) = n.properties.get(community_property).filter(|v| !v.is_null())
                    else {
                        continue;
                    };
                    let rels = snapshot.incident(n, Direction::Both, neighbor_filter);
                    let entry = groups
                        .entry(value_key(c))
                        .or_insert_with(|| (c.clone(), 0, 0.0));
                    entry.1 += rels.len();
                    if let Some(w) = weight {
                        entry.2 += rels
                            .iter()
                            .filter_map(|r| numeric(&r.properties, w))
                            .sum::<f64>();
                    }
                }
                groups
                    .into_values()
                    .map(|(c, count, sum)| {
                        row(json!({ "community": c, "degree": total_value(count, sum, weight) }))
                    })
                    .collect()
            }

            Request::Algorithm {
                algorithm,
                node_filter,
                neighbor_filter,
                weight,
            } => {
                if !self.native_algorithms {
                    return Err(HypographError::CapabilityUnavailable(
                        algorithm.name().to_string(),
                    ));
                }
                let projection = snapshot.project(node_filter, neighbor_filter, weight.as_deref());
                let scores = match algorithm {
                    Algorithm::PageRank {
                        damping,
                        iterations,
                    } => graph::pagerank(
                        &projection,
                        &PageRankSettings {
                            damping: *damping,
                            max_iterations: *iterations,
                            weighted: weight.is_some(),
                            ..PageRankSettings::default()
                        },
                    ),
                    Algorithm::Betweenness => graph::betweenness_centrality(&projection),
                    Algorithm::LabelPropagation { .. } => {
                        return Err(HypographError::Query(
                            "label propagation is a write operation".to_string(),
                        ))
                    }
                };
                let mut scores: Vec<(String, f64)> = scores.into_iter().collect();
                scores.sort_by(|a, b| a.0.cmp(&b.0));
                scores
                    .into_iter()
                    .map(|(id, score)| row(json!({ "id": id, "score": score })))
                    .collect()
            }

            Request::SetNodeProperty { .. } => Vec::new(),
        };

        Ok(rows)
    }

    async fn get_nodes(&self, label: Option<&str>) -> Result<Vec<NodeRecord>> {
        self.ensure_open()?;
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .filter(|n| label.map_or(true, |l| n.labels.iter().any(|x| x == l)))
            .cloned()
            .collect())
    }

    async fn get_edges(&self, rel_type: Option<&str>) -> Result<Vec<EdgeRecord>> {
        self.ensure_open()?;
        Ok(self
            .edges
            .read()
            .await
            .iter()
            .filter(|e| rel_type.map_or(true, |t| e.rel_type == t))
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SubgraphQueryBuilder, SubgraphSpec};
    use crate::adapter::RowExt;

    /// a(age 30) → b(age 40) → c(age 10), a → c, with weights.
    fn sample() -> MemoryGraph {
        MemoryGraph::from_records(
            vec![
                NodeRecord::new("a", &["Person"], json!({"age": 30, "team": "x"})),
                NodeRecord::new("b", &["Person"], json!({"age": 40, "team": "x"})),
                NodeRecord::new("c", &["Person"], json!({"age": 10, "team": "y"})),
            ],
            vec![
                EdgeRecord::new("e1", "KNOWS", "a", "b", json!({"weight": 0.5})),
                EdgeRecord::new("e2", "KNOWS", "b", "c", json!({"weight": 0.25})),
                EdgeRecord::new("e3", "KNOWS", "a", "c", json!({})),
            ],
        )
        .unwrap()
    }

    fn spec(node: &str) -> SubgraphSpec {
        SubgraphSpec::parse(Some(node), None).unwrap()
    }

    #[tokio::test]
    async fn test_edge_total_counts_only_induced_edges() {
        let g = sample();
        let builder = SubgraphQueryBuilder::new();
        let rows = g
            .execute(&builder.edge_total_query(&spec("n.age > 20"), None))
            .await
            .unwrap();
        assert_eq!(rows[0].get_i64("total").unwrap(), 1);

        let rows = g
            .execute(&builder.edge_total_query(&SubgraphSpec::all(), Some("weight")))
            .await
            .unwrap();
        assert!((rows[0].get_f64("total").unwrap() - 0.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_node_degrees_include_zero_degree_nodes() {
        let g = sample();
        let builder = SubgraphQueryBuilder::new();
        let s = spec("n.age > 20").with_direction(Direction::Both);
        let rows = g
            .execute(&builder.per_node_degree_query(&s, None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert_eq!(r.get_i64("degree").unwrap(), 1);
        }

        let rows = g
            .execute(&builder.per_node_degree_query(&spec("n.age < 20"), None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_id("id").unwrap(), "c");
        assert_eq!(rows[0].get_i64("degree").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_node_degrees_by_direction() {
        let g = sample();
        let builder = SubgraphQueryBuilder::new();
        let degree_of = |rows: &[Row], id: &str| {
            rows.iter()
                .find(|r| r.get_id("id").unwrap() == id)
                .map(|r| r.get_i64("degree").unwrap())
        };

        let out = g
            .execute(&builder.per_node_degree_query(&SubgraphSpec::all().with_direction(Direction::Out), None))
            .await
            .unwrap();
        assert_eq!(degree_of(&out, "a"), Some(2));
        assert_eq!(degree_of(&out, "c"), Some(0));

        let inc = g
            .execute(&builder.per_node_degree_query(&SubgraphSpec::all().with_direction(Direction::In), None))
            .await
            .unwrap();
        assert_eq!(degree_of(&inc, "c"), Some(2));
    }

    #[tokio::test]
    async fn test_cooccurrence_groups_values() {
        let g = sample();
        let builder = SubgraphQueryBuilder::new();
        g.add_node(NodeRecord::new("d", &["Person"], json!({"team": "x", "age": 30})))
            .await;
        let rows = g
            .execute(&builder.property_cooccurrence_query(&Predicate::True, "team", "age"))
            .await
            .unwrap();
        let x30 = rows
            .iter()
            .find(|r| r["first"] == json!("x") && r["second"] == json!(30))
            .unwrap();
        assert_eq!(x30.get_i64("count").unwrap(), 2);
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_set_node_property_and_close() {
        let g = sample();
        let builder = SubgraphQueryBuilder::new();
        let rows = g
            .execute(&builder.set_property_query("community", vec!["a".into(), "zz".into()], json!(7)))
            .await
            .unwrap();
        assert_eq!(rows[0].get_i64("updated").unwrap(), 1);
        assert_eq!(g.node_property("a", "community").await, Some(json!(7)));

        g.close().await.unwrap();
        g.close().await.unwrap();
        let err = g
            .execute(&builder.node_count_query(&Predicate::True))
            .await
            .unwrap_err();
        assert!(matches!(err, HypographError::Connection(_)));
    }

    #[tokio::test]
    async fn test_algorithms_unavailable_when_disabled() {
        let g = sample().without_native_algorithms();
        let builder = SubgraphQueryBuilder::new();
        let err = g
            .execute(&builder.algorithm_query(&SubgraphSpec::all(), Algorithm::Betweenness, None))
            .await
            .unwrap_err();
        assert!(matches!(err, HypographError::CapabilityUnavailable(_)));
    }

    #[tokio::test]
    async fn test_edge_must_reference_known_nodes() {
        let g = sample();
        let err = g
            .add_edge(EdgeRecord::new("e9", "KNOWS", "a", "missing", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, HypographError::Query(_)));
    }

    #[tokio::test]
    async fn test_get_nodes_and_edges_filter_by_label_and_type() {
        let g = sample();
        g.add_node(NodeRecord::new("d", &["Robot"], json!({}))).await;
        assert_eq!(g.get_nodes(Some("Person")).await.unwrap().len(), 3);
        assert_eq!(g.get_nodes(None).await.unwrap().len(), 4);
        assert_eq!(g.get_edges(Some("KNOWS")).await.unwrap().len(), 3);
        assert!(g.get_edges(Some("LIKES")).await.unwrap().is_empty());
    }
}
