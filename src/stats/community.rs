//! Community detection and modularity.

use super::{edge_total, run_native, AlgorithmResult, Native, StatsSettings};
use crate::adapter::{GraphAdapter, Row, RowExt};
use crate::error::Result;
use crate::graph::{self, Projection};
use crate::predicate::value_key;
use crate::query::{Algorithm, SubgraphQueryBuilder, SubgraphSpec};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of a community detection run. Labels live in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub node_count: u64,
    pub community_count: u64,
    pub iterations: u32,
    pub converged: bool,
}

pub struct CommunityAnalyzer {
    adapter: Arc<dyn GraphAdapter>,
    builder: SubgraphQueryBuilder,
    settings: StatsSettings,
}

impl CommunityAnalyzer {
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

    /// Label propagation over the induced subgraph, labels written to
    /// `write_property` on every member node.
    ///
    /// Uses the store's native algorithm when available; otherwise runs label
    /// propagation locally over the induced edges and writes the labels back.
    pub async fn detect_communities(
        &self,
        write_property: &str,
        spec: &SubgraphSpec,
        weight: Option<&str>,
    ) -> Result<AlgorithmResult<CommunitySummary>> {
        let max_iterations = self.settings.label_propagation_iterations;
        let request = self.builder.algorithm_query(
            spec,
            Algorithm::LabelPropagation {
                write_property: write_property.to_string(),
                max_iterations,
            },
            weight,
        );

        match run_native(self.adapter.as_ref(), &request).await? {
            Native::Rows(rows) => {
                let summary = match rows.first() {
                    Some(row) => decode_summary(row)?,
                    None => CommunitySummary {
                        node_count: 0,
                        community_count: 0,
                        iterations: 0,
                        converged: true,
                    },
                };
                info!(
                    communities = summary.community_count,
                    "Native label propagation finished"
                );
                Ok(AlgorithmResult::native(summary))
            }
            Native::Unavailable(reason) => {
                let summary = self
                    .local_label_propagation(write_property, spec, weight, max_iterations)
                    .await?;
                Ok(AlgorithmResult::fallback(summary, reason))
            }
        }
    }

    async fn local_label_propagation(
        &self,
        write_property: &str,
        spec: &SubgraphSpec,
        weight: Option<&str>,
        max_iterations: u32,
    ) -> Result<CommunitySummary> {
        let members = self
            .adapter
            .execute(&self.builder.per_node_degree_query(spec, None))
            .await?;
        let edges = self
            .adapter
            .execute(&self.builder.induced_edge_query(spec, weight))
            .await?;

        let mut projection = Projection::new();
        for row in &members {
            projection.add_node(&row.get_id("id")?);
        }
        for row in &edges {
            let w = row.get_opt_f64("weight")?.unwrap_or(1.0);
            projection.add_edge(&row.get_id("source")?, &row.get_id("target")?, w);
        }

        let outcome = graph::label_propagation(&projection, max_iterations);

        let mut by_label: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for (id, label) in outcome.labels {
            by_label.entry(label).or_default().push(id);
        }
        let node_count = projection.node_count() as u64;
        for (label, mut ids) in by_label {
            ids.sort();
            let request = self
                .builder
                .set_property_query(write_property, ids, json!(label));
            self.adapter.execute(&request).await?;
        }
        debug!(
            nodes = node_count,
            communities = outcome.community_count,
            "Wrote local label propagation results"
        );

        Ok(CommunitySummary {
            node_count,
            community_count: outcome.community_count as u64,
            iterations: outcome.ran_iterations,
            converged: outcome.did_converge,
        })
    }

    /// `Q = Σ_c (e_c/M − (a_c/2M)²)` over the induced subgraph, using the
    /// community labels stored under `community_property`. 0 when `M = 0`.
    pub async fn modularity(
        &self,
        community_property: &str,
        spec: &SubgraphSpec,
        weight: Option<&str>,
    ) -> Result<f64> {
        let m = edge_total(self.adapter.as_ref(), &self.builder, spec, weight).await?;
        if m == 0.0 {
            return Ok(0.0);
        }

        let internal = self
            .adapter
            .execute(
                &self
                    .builder
                    .community_internal_query(spec, community_property, weight),
            )
            .await?;
        let degrees = self
            .adapter
            .execute(
                &self
                    .builder
                    .community_degree_query(spec, community_property, weight),
            )
            .await?;

        // community → (e_c, a_c)
        let mut accumulator: HashMap<String, (f64, f64)> = HashMap::new();
        for row in &internal {
            let (key, value) = community_entry(row, "weight")?;
            accumulator.entry(key).or_default().0 += value;
        }
        for row in &degrees {
            let (key, value) = community_entry(row, "degree")?;
            accumulator.entry(key).or_default().1 += value;
        }

        Ok(accumulator
            .values()
            .map(|(e, a)| e / m - (a / (2.0 * m)).powi(2))
            .sum())
    }
}

fn community_entry(row: &Row, column: &str) -> Result<(String, f64)> {
    let key = value_key(row.get_value("community")?);
    Ok((key, row.get_opt_f64(column)?.unwrap_or(0.0)))
}

fn decode_summary(row: &Row) -> Result<CommunitySummary> {
    Ok(CommunitySummary {
        node_count: row.get_i64("nodeCount")?.max(0) as u64,
        community_count: row.get_i64("communityCount")?.max(0) as u64,
        iterations: row.get_i64("ranIterations")?.max(0) as u32,
        converged: row.get_bool("didConverge")?,
    })
}
