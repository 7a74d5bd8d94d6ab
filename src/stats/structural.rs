//! Density, degree distribution and centralities.

use super::{edge_total, estimators, node_count, run_native, AlgorithmResult, Native, StatsSettings};
use crate::adapter::{GraphAdapter, Row, RowExt};
use crate::error::Result;
use crate::query::{Algorithm, SubgraphQueryBuilder, SubgraphSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Number of nodes sharing one degree (or strength) value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegreeBucket {
    pub degree: f64,
    pub count: usize,
}

pub struct StructuralStatistics {
    adapter: Arc<dyn GraphAdapter>,
    builder: SubgraphQueryBuilder,
    settings: StatsSettings,
}

impl StructuralStatistics {
    pub fn new(adapter: Arc<dyn GraphAdapter>) -> Self {
        Self::with_settings(adapter, StatsSettings::default())
    }

    pub fn with_settings(adapter: Arc<dyn GraphAdapter>, settings: StatsSettings) -> Self {
        Self {
            adapter,
            builder: SubgraphQueryBuilder::new(),
            settings,
        }
    }

    /// `2·W / (N·(N−1))` over the induced subgraph; 0 when fewer than 2 nodes.
    ///
    /// `W` is the edge count, or the sum of `weight` over induced edges.
    pub async fn density(&self, spec: &SubgraphSpec, weight: Option<&str>) -> Result<f64> {
        let n = node_count(self.adapter.as_ref(), &self.builder, &spec.node_filter).await?;
        if n < 2 {
            return Ok(0.0);
        }
        let w = edge_total(self.adapter.as_ref(), &self.builder, spec, weight).await?;
        debug!(nodes = n, total = w, "Computed density inputs");
        Ok(estimators::density(n, w))
    }

    /// Per-node degree (or strength) in `spec.direction`, zero-degree nodes included.
    pub async fn node_degrees(
        &self,
        spec: &SubgraphSpec,
        weight: Option<&str>,
    ) -> Result<HashMap<String, f64>> {
        let rows = self
            .adapter
            .execute(&self.builder.per_node_degree_query(spec, weight))
            .await?;
        rows.iter().map(decode_degree).collect()
    }

    /// Number of nodes per degree value, sorted by degree.
    pub async fn degree_distribution(
        &self,
        spec: &SubgraphSpec,
        weight: Option<&str>,
    ) -> Result<Vec<DegreeBucket>> {
        let degrees = self.node_degrees(spec, weight).await?;
        let mut values: Vec<f64> = degrees.into_values().collect();
        values.sort_by(f64::total_cmp);

        let mut buckets: Vec<DegreeBucket> = Vec::new();
        for degree in values {
            match buckets.last_mut() {
                Some(last) if last.degree == degree => last.count += 1,
                _ => buckets.push(DegreeBucket { degree, count: 1 }),
            }
        }
        Ok(buckets)
    }

    /// `degree / (N−1)` per node in `spec.direction`. Empty when `N ≤ 1`.
    pub async fn degree_centrality(&self, spec: &SubgraphSpec) -> Result<HashMap<String, f64>> {
        let degrees = self.node_degrees(spec, None).await?;
        let n = degrees.len();
        if n <= 1 {
            return Ok(HashMap::new());
        }
        let scale = (n - 1) as f64;
        Ok(degrees
            .into_iter()
            .map(|(id, degree)| (id, degree / scale))
            .collect())
    }

    /// PageRank with the configured damping and iteration count.
    pub async fn pagerank(
        &self,
        spec: &SubgraphSpec,
    ) -> Result<AlgorithmResult<HashMap<String, f64>>> {
        self.pagerank_with(spec, self.settings.pagerank_damping, self.settings.pagerank_iterations)
            .await
    }

    /// PageRank by the store's native algorithm over the induced subgraph.
    ///
    /// Falls back to [`degree_centrality`](Self::degree_centrality) over the
    /// same spec when the native algorithm is unavailable or fails.
    pub async fn pagerank_with(
        &self,
        spec: &SubgraphSpec,
        damping: f64,
        iterations: u32,
    ) -> Result<AlgorithmResult<HashMap<String, f64>>> {
        let request = self.builder.algorithm_query(
            spec,
            Algorithm::PageRank {
                damping,
                iterations,
            },
            None,
        );
        match run_native(self.adapter.as_ref(), &request).await? {
            Native::Rows(rows) => Ok(AlgorithmResult::native(decode_scores(&rows)?)),
            Native::Unavailable(reason) => Ok(AlgorithmResult::fallback(
                self.degree_centrality(spec).await?,
                reason,
            )),
        }
    }

    /// Betweenness by the store's native algorithm; empty on fallback.
    pub async fn betweenness_centrality(
        &self,
        spec: &SubgraphSpec,
    ) -> Result<AlgorithmResult<HashMap<String, f64>>> {
        let request = self
            .builder
            .algorithm_query(spec, Algorithm::Betweenness, None);
        match run_native(self.adapter.as_ref(), &request).await? {
            Native::Rows(rows) => Ok(AlgorithmResult::native(decode_scores(&rows)?)),
            Native::Unavailable(reason) => Ok(AlgorithmResult::fallback(HashMap::new(), reason)),
        }
    }
}

fn decode_degree(row: &Row) -> Result<(String, f64)> {
    Ok((row.get_id("id")?, row.get_opt_f64("degree")?.unwrap_or(0.0)))
}

fn decode_scores(rows: &[Row]) -> Result<HashMap<String, f64>> {
    rows.iter()
        .map(|row| Ok((row.get_id("id")?, row.get_f64("score")?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryGraph;
    use crate::query::Direction;
    use crate::stats::ResultSource;
    use crate::test_helpers::{chain_with_weights, path_of_three, spec};

    #[tokio::test]
    async fn test_density_unweighted_and_weighted() {
        let stats = StructuralStatistics::new(Arc::new(chain_with_weights()));
        let all = SubgraphSpec::all();
        assert_eq!(stats.density(&all, None).await.unwrap(), 0.5);
        assert_eq!(stats.density(&all, Some("weight")).await.unwrap(), 0.25);
    }

    #[tokio::test]
    async fn test_density_follows_node_filter_to_both_endpoints() {
        let stats = StructuralStatistics::new(Arc::new(chain_with_weights()));
        // keeps a, b, c: edges a→b and b→c survive, c→d does not
        let filtered = spec("n.rank < 3");
        assert_eq!(
            stats.density(&filtered, None).await.unwrap(),
            2.0 * 2.0 / 6.0
        );
        assert_eq!(stats.density(&spec("n.rank = 0"), None).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_both_direction_degrees_count_self_loop_once() {
        use crate::adapter::{EdgeRecord, NodeRecord};
        use serde_json::json;

        let graph = MemoryGraph::from_records(
            vec![
                NodeRecord::new("a", &["Node"], json!({})),
                NodeRecord::new("b", &["Node"], json!({})),
            ],
            vec![
                EdgeRecord::new("ab", "LINKS", "a", "b", json!({})),
                EdgeRecord::new("ba", "LINKS", "b", "a", json!({})),
                EdgeRecord::new("aa", "LINKS", "a", "a", json!({})),
            ],
        )
        .unwrap();
        let stats = StructuralStatistics::new(Arc::new(graph));
        let degrees = stats.node_degrees(&SubgraphSpec::all(), None).await.unwrap();
        assert_eq!(degrees.len(), 2);
        assert_eq!(degrees["a"], 3.0);
        assert_eq!(degrees["b"], 2.0);
    }

    #[tokio::test]
    async fn test_both_direction_degrees_sum_to_twice_edge_total() {
        let stats = StructuralStatistics::new(Arc::new(chain_with_weights()));
        for subgraph in [
            SubgraphSpec::all(),
            spec("n.rank < 3"),
            SubgraphSpec::parse(Some("n.rank > 0"), Some("r.rank_gap = 2.0")).unwrap(),
        ] {
            for weight in [None, Some("weight")] {
                let degrees = stats.node_degrees(&subgraph, weight).await.unwrap();
                let total =
                    edge_total(stats.adapter.as_ref(), &stats.builder, &subgraph, weight)
                        .await
                        .unwrap();
                let sum: f64 = degrees.values().sum();
                assert!(
                    (sum - 2.0 * total).abs() < 1e-12,
                    "{:?}: degree sum {} vs edge total {}",
                    subgraph,
                    sum,
                    total
                );
            }
        }
    }

    #[tokio::test]
    async fn test_degrees_with_node_and_edge_filters() {
        use crate::adapter::{EdgeRecord, NodeRecord};
        use serde_json::json;

        // hub h linked to x, y and z; z is not an Item and h-y is a weak tie
        let graph = MemoryGraph::from_records(
            vec![
                NodeRecord::new("h", &["Item"], json!({})),
                NodeRecord::new("x", &["Item"], json!({})),
                NodeRecord::new("y", &["Item"], json!({})),
                NodeRecord::new("z", &["Other"], json!({})),
            ],
            vec![
                EdgeRecord::new("hx", "LINKS", "h", "x", json!({ "weight": 1.0 })),
                EdgeRecord::new("hy", "LINKS", "h", "y", json!({ "weight": 0.1 })),
                EdgeRecord::new("zh", "LINKS", "z", "h", json!({ "weight": 1.0 })),
            ],
        )
        .unwrap();
        let stats = StructuralStatistics::new(Arc::new(graph));
        let filtered = SubgraphSpec::parse(Some("n:Item"), Some("r.weight >= 0.5")).unwrap();

        let degrees = stats.node_degrees(&filtered, None).await.unwrap();
        assert_eq!(degrees.len(), 3);
        assert_eq!(degrees["h"], 1.0);
        assert_eq!(degrees["x"], 1.0);
        assert_eq!(degrees["y"], 0.0);

        let out = stats
            .node_degrees(&filtered.clone().with_direction(Direction::Out), None)
            .await
            .unwrap();
        assert_eq!(out["h"], 1.0);
        assert_eq!(out["x"], 0.0);
    }

    #[tokio::test]
    async fn test_degree_centrality_of_path() {
        let stats = StructuralStatistics::new(Arc::new(path_of_three()));
        let centrality = stats.degree_centrality(&SubgraphSpec::all()).await.unwrap();
        assert_eq!(centrality.len(), 3);
        assert_eq!(centrality["n1"], 1.0);
        assert_eq!(centrality["n2"], 0.5);
        assert_eq!(centrality["n3"], 0.5);
    }

    #[tokio::test]
    async fn test_degree_centrality_single_node_is_empty() {
        let stats = StructuralStatistics::new(Arc::new(path_of_three()));
        let centrality = stats.degree_centrality(&spec("n.name = 'n1'")).await.unwrap();
        assert!(centrality.is_empty());
    }

    #[tokio::test]
    async fn test_degree_distribution_includes_isolated_nodes() {
        let graph = chain_with_weights();
        graph
            .add_node(crate::adapter::NodeRecord::new(
                "lonely",
                &["Item"],
                serde_json::json!({"rank": 9}),
            ))
            .await;
        let stats = StructuralStatistics::new(Arc::new(graph));
        let buckets = stats
            .degree_distribution(&SubgraphSpec::all(), None)
            .await
            .unwrap();
        assert_eq!(
            buckets,
            vec![
                DegreeBucket { degree: 0.0, count: 1 },
                DegreeBucket { degree: 1.0, count: 2 },
                DegreeBucket { degree: 2.0, count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_degree_distribution_weighted_strength() {
        let stats = StructuralStatistics::new(Arc::new(chain_with_weights()));
        let buckets = stats
            .degree_distribution(&SubgraphSpec::all().with_direction(Direction::Out), Some("weight"))
            .await
            .unwrap();
        let total: f64 = buckets.iter().map(|b| b.degree * b.count as f64).sum();
        assert!((total - 1.5).abs() < 1e-12);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 4);
    }

    #[tokio::test]
    async fn test_pagerank_native() {
        let stats = StructuralStatistics::new(Arc::new(path_of_three()));
        let result = stats.pagerank(&SubgraphSpec::all()).await.unwrap();
        assert!(result.is_native());
        assert_eq!(result.value.len(), 3);
        let total: f64 = result.value.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_pagerank_falls_back_to_degree_centrality() {
        let graph = path_of_three().without_native_algorithms();
        let stats = StructuralStatistics::new(Arc::new(graph));
        let result = stats.pagerank(&SubgraphSpec::all()).await.unwrap();
        assert!(matches!(result.source, ResultSource::Fallback { .. }));
        assert_eq!(result.value["n1"], 1.0);
    }

    #[tokio::test]
    async fn test_betweenness_native_and_fallback() {
        let stats = StructuralStatistics::new(Arc::new(path_of_three()));
        let result = stats
            .betweenness_centrality(&SubgraphSpec::all())
            .await
            .unwrap();
        assert!(result.is_native());
        assert!(result.value.values().all(|&s| s >= 0.0));

        let stats = StructuralStatistics::new(Arc::new(MemoryGraph::new().without_native_algorithms()));
        let result = stats
            .betweenness_centrality(&SubgraphSpec::all())
            .await
            .unwrap();
        assert!(!result.is_native());
        assert!(result.value.is_empty());
    }
}
