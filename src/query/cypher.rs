//! Cypher rendering of [`Request`]s.
//!
//! Filters are inlined as `WHERE` text (they are already an escaped expression
//! tree); runtime values such as id lists, algorithm settings and the
//! projected graph name travel as parameters.

use super::{Algorithm, Direction, Request};
use crate::predicate::{escape_identifier, CompareOp, Operand, Predicate, PredicateRewriter};
use serde_json::{json, Map, Value};

/// One Cypher statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Map<String, Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Statements needed to answer a request.
///
/// `setup` runs first, then `main` whose rows are the answer. `teardown` runs
/// afterwards whatever the outcome of `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherPlan {
    pub setup: Vec<Statement>,
    pub main: Statement,
    pub teardown: Vec<Statement>,
}

impl CypherPlan {
    fn single(main: Statement) -> Self {
        Self {
            setup: Vec::new(),
            main,
            teardown: Vec::new(),
        }
    }
}

impl Request {
    /// Render the request as Cypher.
    pub fn to_cypher(&self) -> CypherPlan {
        match self {
            Self::NodeCount { filter } => CypherPlan::single(Statement::new(format!(
                "MATCH (n){} RETURN count(n) AS count",
                where_clause(filter)
            ))),

            Self::EdgeTotal { filter, weight } => {
                let total = match weight {
                    Some(w) => format!("coalesce(sum(toFloat(r.{})), 0.0)", escape_identifier(w)),
                    None => "count(r)".to_string(),
                };
                CypherPlan::single(Statement::new(format!(
                    "MATCH (n)-[r]->(m){} RETURN {} AS total",
                    where_clause(filter),
                    total
                )))
            }

            Self::EdgeList { filter, weight } => {
                let weight = match weight {
                    Some(w) => format!("toFloat(r.{})", escape_identifier(w)),
                    None => "1.0".to_string(),
                };
                CypherPlan::single(Statement::new(format!(
                    "MATCH (n)-[r]->(m){} \
                     RETURN elementId(n) AS source, elementId(m) AS target, {} AS weight",
                    where_clause(filter),
                    weight
                )))
            }

            Self::NodeDegrees {
                node_filter,
                neighbor_filter,
                direction,
                weight,
            } => CypherPlan::single(Statement::new(format!(
                "MATCH (n){} \
                 OPTIONAL MATCH {}{} \
                 WITH n, collect(DISTINCT r) AS rels \
                 RETURN elementId(n) AS id, {} AS degree",
                where_clause(node_filter),
                pattern(*direction),
                where_clause(neighbor_filter),
                degree_expression(weight.as_deref())
            ))),

            Self::PropertyPairs {
                filter,
                first,
                second,
            } => CypherPlan::single(Statement::new(format!(
                "MATCH (n){} RETURN n.{} AS first, n.{} AS second",
                where_clause(&with_present(filter, &[first, second])),
                escape_identifier(first),
                escape_identifier(second)
            ))),

            Self::PropertyCooccurrence {
                filter,
                first,
                second,
            } => CypherPlan::single(Statement::new(format!(
                "MATCH (n){} RETURN n.{} AS first, n.{} AS second, count(*) AS count",
                where_clause(&with_present(filter, &[first, second])),
                escape_identifier(first),
                escape_identifier(second)
            ))),

            Self::CommunityInternalWeight {
                community_property,
                filter,
                weight,
            } => {
                let c = escape_identifier(community_property);
                let total = match weight {
                    Some(w) => format!("coalesce(sum(toFloat(r.{})), 0.0)", escape_identifier(w)),
                    None => "count(r)".to_string(),
                };
                let filter = PredicateRewriter::combine([
                    with_present(filter, &[community_property]),
                    same_community(community_property),
                ]);
                CypherPlan::single(Statement::new(format!(
                    "MATCH (n)-[r]->(m){} RETURN n.{} AS community, {} AS weight",
                    where_clause(&filter),
                    c,
                    total
                )))
            }

            Self::CommunityDegree {
                community_property,
                node_filter,
                neighbor_filter,
                weight,
            } => CypherPlan::single(Statement::new(format!(
                "MATCH (n){} \
                 OPTIONAL MATCH {}{} \
                 WITH n, collect(DISTINCT r) AS rels \
                 RETURN n.{} AS community, sum({}) AS degree",
                where_clause(&with_present(node_filter, &[community_property])),
                pattern(Direction::Both),
                where_clause(neighbor_filter),
                escape_identifier(community_property),
                degree_expression(weight.as_deref())
            ))),

            Self::SetNodeProperty {
                property,
                ids,
                value,
            } => CypherPlan::single(
                Statement::new(format!(
                    "MATCH (n) WHERE elementId(n) IN $ids SET n.{} = $value RETURN count(n) AS updated",
                    escape_identifier(property)
                ))
                .param("ids", ids.clone())
                .param("value", value.clone()),
            ),

            Self::Algorithm {
                algorithm,
                node_filter,
                neighbor_filter,
                weight,
            } => algorithm_plan(algorithm, node_filter, neighbor_filter, weight.as_deref()),
        }
    }
}

/// GDS project / run / drop around a uniquely named in-memory graph.
fn algorithm_plan(
    algorithm: &Algorithm,
    node_filter: &Predicate,
    neighbor_filter: &Predicate,
    weight: Option<&str>,
) -> CypherPlan {
    let graph_name = format!("hypograph_{}", uuid::Uuid::new_v4().simple());

    let data_config = match weight {
        Some(w) => format!(
            "{{relationshipProperties: {{weight: coalesce(toFloat(r.{}), 1.0)}}}}",
            escape_identifier(w)
        ),
        None => "{}".to_string(),
    };
    let projection_config = match algorithm {
        Algorithm::LabelPropagation { .. } => ", {undirectedRelationshipTypes: ['*']}",
        _ => "",
    };
    let project = Statement::new(format!(
        "MATCH (n){} \
         OPTIONAL MATCH (n)-[r]->(m){} \
         WITH gds.graph.project($graph, n, m, {}{}) AS g \
         RETURN g.graphName AS graph, g.nodeCount AS nodeCount, g.relationshipCount AS relationshipCount",
        where_clause(node_filter),
        where_clause(neighbor_filter),
        data_config,
        projection_config
    ))
    .param("graph", graph_name.clone());

    let weight_config = if weight.is_some() {
        ", relationshipWeightProperty: 'weight'"
    } else {
        ""
    };
    let main = match algorithm {
        Algorithm::PageRank {
            damping,
            iterations,
        } => Statement::new(format!(
            "CALL gds.pageRank.stream($graph, {{dampingFactor: $damping, maxIterations: $iterations{}}}) \
             YIELD nodeId, score \
             RETURN elementId(gds.util.asNode(nodeId)) AS id, score",
            weight_config
        ))
        .param("damping", *damping)
        .param("iterations", *iterations),
        Algorithm::Betweenness => Statement::new(format!(
            "CALL gds.betweenness.stream($graph, {{{}}}) \
             YIELD nodeId, score \
             RETURN elementId(gds.util.asNode(nodeId)) AS id, score",
            weight_config.trim_start_matches(", ")
        )),
        Algorithm::LabelPropagation {
            write_property,
            max_iterations,
        } => Statement::new(format!(
            "CALL gds.labelPropagation.write($graph, {{writeProperty: $writeProperty, maxIterations: $maxIterations{}}}) \
             YIELD nodePropertiesWritten, communityCount, ranIterations, didConverge \
             RETURN nodePropertiesWritten AS nodeCount, communityCount, ranIterations, didConverge",
            weight_config
        ))
        .param("writeProperty", write_property.clone())
        .param("maxIterations", *max_iterations),
    }
    .param("graph", graph_name.clone());

    let drop = Statement::new("CALL gds.graph.drop($graph, false) YIELD graphName RETURN graphName")
        .param("graph", json!(graph_name));

    CypherPlan {
        setup: vec![project],
        main,
        teardown: vec![drop],
    }
}

fn where_clause(filter: &Predicate) -> String {
    if filter.is_true() {
        String::new()
    } else {
        format!(" WHERE {}", filter)
    }
}

fn pattern(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "(n)-[r]->(m)",
        Direction::In => "(n)<-[r]-(m)",
        Direction::Both => "(n)-[r]-(m)",
    }
}

fn degree_expression(weight: Option<&str>) -> String {
    match weight {
        Some(w) => format!(
            "reduce(s = 0.0, x IN rels | s + coalesce(toFloat(x.{}), 0.0))",
            escape_identifier(w)
        ),
        None => "size(rels)".to_string(),
    }
}

/// `filter AND n.p IS NOT NULL ...`
fn with_present(filter: &Predicate, properties: &[&String]) -> Predicate {
    let present = properties.iter().map(|p| Predicate::IsNull {
        operand: Operand::Property {
            variable: "n".to_string(),
            key: p.to_string(),
        },
        negated: true,
    });
    PredicateRewriter::combine(std::iter::once(filter.clone()).chain(present))
}

/// `n.c = m.c`
fn same_community(property: &str) -> Predicate {
    Predicate::Compare {
        left: Operand::Property {
            variable: "n".to_string(),
            key: property.to_string(),
        },
        op: CompareOp::Eq,
        right: Operand::Property {
            variable: "m".to_string(),
            key: property.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SubgraphQueryBuilder, SubgraphSpec};

    fn spec(node: &str) -> SubgraphSpec {
        SubgraphSpec::parse(Some(node), None).unwrap()
    }

    #[test]
    fn test_node_count_without_filter_has_no_where() {
        let plan = Request::NodeCount {
            filter: Predicate::True,
        }
        .to_cypher();
        assert_eq!(plan.main.text, "MATCH (n) RETURN count(n) AS count");
        assert!(plan.setup.is_empty() && plan.teardown.is_empty());
    }

    #[test]
    fn test_edge_total_filters_both_endpoints() {
        let builder = SubgraphQueryBuilder::new();
        let plan = builder
            .edge_total_query(&spec("n.age > 20"), Some("weight"))
            .to_cypher();
        assert_eq!(
            plan.main.text,
            "MATCH (n)-[r]->(m) WHERE n.age > 20 AND m.age > 20 \
             RETURN coalesce(sum(toFloat(r.weight)), 0.0) AS total"
        );
    }

    #[test]
    fn test_node_degrees_pattern_follows_direction() {
        let builder = SubgraphQueryBuilder::new();
        let incoming = builder
            .per_node_degree_query(&spec("n:A").with_direction(Direction::In), None)
            .to_cypher();
        assert!(incoming.main.text.contains("OPTIONAL MATCH (n)<-[r]-(m) WHERE m:A"));
        assert!(incoming.main.text.contains("collect(DISTINCT r)"));
        assert!(incoming.main.text.ends_with("size(rels) AS degree"));

        let both = builder.per_node_degree_query(&spec("n:A"), Some("w")).to_cypher();
        assert!(both.main.text.contains("(n)-[r]-(m)"));
        assert!(both.main.text.contains("coalesce(toFloat(x.w), 0.0)"));
    }

    #[test]
    fn test_weight_identifier_is_escaped() {
        let plan = Request::EdgeTotal {
            filter: Predicate::True,
            weight: Some("odd name".to_string()),
        }
        .to_cypher();
        assert!(plan.main.text.contains("r.`odd name`"));
    }

    #[test]
    fn test_community_internal_requires_shared_community() {
        let builder = SubgraphQueryBuilder::new();
        let plan = builder
            .community_internal_query(&SubgraphSpec::all(), "community", None)
            .to_cypher();
        assert_eq!(
            plan.main.text,
            "MATCH (n)-[r]->(m) WHERE n.community IS NOT NULL AND n.community = m.community \
             RETURN n.community AS community, count(r) AS weight"
        );
    }

    #[test]
    fn test_algorithm_plan_projects_and_drops_same_graph() {
        let builder = SubgraphQueryBuilder::new();
        let plan = builder
            .algorithm_query(
                &spec("n.active = true"),
                Algorithm::PageRank {
                    damping: 0.85,
                    iterations: 20,
                },
                None,
            )
            .to_cypher();

        assert_eq!(plan.setup.len(), 1);
        assert_eq!(plan.teardown.len(), 1);
        let name = plan.setup[0].params.get("graph").cloned();
        assert!(name.is_some());
        assert_eq!(plan.main.params.get("graph").cloned(), name);
        assert_eq!(plan.teardown[0].params.get("graph").cloned(), name);
        assert!(plan.setup[0].text.contains("WHERE m.active = true"));
        assert!(plan.main.text.starts_with("CALL gds.pageRank.stream"));
        assert_eq!(plan.main.params.get("damping"), Some(&json!(0.85)));
    }

    #[test]
    fn test_set_property_passes_values_as_parameters() {
        let plan = Request::SetNodeProperty {
            property: "community".to_string(),
            ids: vec!["4:a:1".to_string()],
            value: json!(3),
        }
        .to_cypher();
        assert!(plan.main.text.contains("SET n.community = $value"));
        assert_eq!(plan.main.params.get("ids"), Some(&json!(["4:a:1"])));
    }
}
