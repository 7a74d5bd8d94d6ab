//! Frequentist tests over node properties and subgraph density.
//!
//! The Bayesian density tests live in [`super::bayesian`] as a second `impl`
//! block on [`HypothesisTestingSuite`].

use super::{estimators, StatsSettings};
use crate::adapter::{GraphAdapter, Row, RowExt};
use crate::error::{HypographError, Result};
use crate::predicate::{value_key, Predicate};
use crate::query::{SubgraphQueryBuilder, SubgraphSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Test statistic with its p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

impl From<(f64, f64)> for TestResult {
    fn from((statistic, p_value): (f64, f64)) -> Self {
        Self { statistic, p_value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub chi2: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    /// Expected frequencies, rows and columns ordered as `row_values` and `column_values`.
    pub expected: Vec<Vec<f64>>,
    pub row_values: Vec<Value>,
    pub column_values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl FromStr for CorrelationMethod {
    type Err = HypographError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            other => Err(HypographError::validation(format!(
                "unknown correlation method '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub coefficient: f64,
    pub p_value: f64,
}

pub struct HypothesisTestingSuite {
    pub(super) adapter: Arc<dyn GraphAdapter>,
    pub(super) builder: SubgraphQueryBuilder,
    pub(super) settings: StatsSettings,
}

impl HypothesisTestingSuite {
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

    /// Two-tailed z-test of the induced subgraph's density against `expected`.
    ///
    /// `node_count` sets the number of possible edges. With a weight property
    /// every induced edge weight must lie in `[0, 1]`.
    pub async fn z_test_density(
        &self,
        expected: f64,
        node_count: u64,
        spec: &SubgraphSpec,
        weight: Option<&str>,
    ) -> Result<TestResult> {
        let observed = match weight {
            None => {
                let n = super::node_count(self.adapter.as_ref(), &self.builder, &spec.node_filter)
                    .await?;
                let total =
                    super::edge_total(self.adapter.as_ref(), &self.builder, spec, None).await?;
                estimators::density(n, total)
            }
            Some(w) => self.bounded_weight_density(spec, w).await?,
        };
        debug!(observed, expected, "Density z-test");
        Ok(estimators::density_z_test(observed, expected, node_count)?.into())
    }

    async fn bounded_weight_density(&self, spec: &SubgraphSpec, weight: &str) -> Result<f64> {
        let n = super::node_count(self.adapter.as_ref(), &self.builder, &spec.node_filter).await?;
        let rows = self
            .adapter
            .execute(&self.builder.induced_edge_query(spec, Some(weight)))
            .await?;
        let mut total = 0.0;
        for row in &rows {
            let w = row.get_opt_f64("weight")?.unwrap_or(0.0);
            if !(0.0..=1.0).contains(&w) {
                return Err(HypographError::validation(format!(
                    "weighted z-test needs '{}' in [0, 1], found {}",
                    weight, w
                )));
            }
            total += w;
        }
        Ok(estimators::density(n, total))
    }

    /// One-way ANOVA of `metric_property` across the groups of `group_property`.
    pub async fn anova_test(
        &self,
        group_property: &str,
        metric_property: &str,
        node_filter: &Predicate,
    ) -> Result<TestResult> {
        let rows = self
            .adapter
            .execute(
                &self
                    .builder
                    .property_pairs_query(node_filter, group_property, metric_property),
            )
            .await?;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<f64>> = Vec::new();
        for row in &rows {
            let key = value_key(row.get_value("first")?);
            let value = numeric_column(row, "second", metric_property)?;
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(value);
        }

        if groups.len() < 2 {
            return Err(HypographError::validation(format!(
                "ANOVA needs at least 2 groups of '{}', found {}",
                group_property,
                groups.len()
            )));
        }
        Ok(estimators::one_way_anova(&groups)?.into())
    }

    /// Chi-square test of independence between two node properties.
    ///
    /// Rows are the sorted distinct values of `property_a`, columns those of
    /// `property_b`.
    pub async fn chi_square_test(
        &self,
        property_a: &str,
        property_b: &str,
        node_filter: &Predicate,
    ) -> Result<ChiSquareResult> {
        let rows = self
            .adapter
            .execute(
                &self
                    .builder
                    .property_cooccurrence_query(node_filter, property_a, property_b),
            )
            .await?;

        let mut cells = Vec::with_capacity(rows.len());
        for row in &rows {
            cells.push((
                row.get_value("first")?.clone(),
                row.get_value("second")?.clone(),
                row.get_f64("count")?,
            ));
        }

        let row_values = sorted_distinct(cells.iter().map(|c| &c.0));
        let column_values = sorted_distinct(cells.iter().map(|c| &c.1));
        let position = |values: &[Value], v: &Value| {
            values
                .binary_search_by(|candidate| compare_values(candidate, v))
                .unwrap_or_default()
        };

        let mut table = vec![vec![0.0; column_values.len()]; row_values.len()];
        for (a, b, count) in &cells {
            table[position(&row_values, a)][position(&column_values, b)] += count;
        }

        let outcome = estimators::chi_square_independence(&table)?;
        Ok(ChiSquareResult {
            chi2: outcome.chi2,
            p_value: outcome.p_value,
            degrees_of_freedom: outcome.degrees_of_freedom,
            expected: outcome.expected,
            row_values,
            column_values,
        })
    }

    /// Pearson or Spearman correlation between two numeric node properties.
    ///
    /// Fewer than 2 pairs yields `(0, 1)`.
    pub async fn correlation_test(
        &self,
        property_a: &str,
        property_b: &str,
        method: CorrelationMethod,
        node_filter: &Predicate,
    ) -> Result<CorrelationResult> {
        let rows = self
            .adapter
            .execute(
                &self
                    .builder
                    .property_pairs_query(node_filter, property_a, property_b),
            )
            .await?;

        let mut xs = Vec::with_capacity(rows.len());
        let mut ys = Vec::with_capacity(rows.len());
        for row in &rows {
            xs.push(numeric_column(row, "first", property_a)?);
            ys.push(numeric_column(row, "second", property_b)?);
        }

        let (coefficient, p_value) = match method {
            CorrelationMethod::Pearson => estimators::pearson(&xs, &ys)?,
            CorrelationMethod::Spearman => estimators::spearman(&xs, &ys)?,
        };
        Ok(CorrelationResult {
            coefficient,
            p_value,
        })
    }
}

fn numeric_column(row: &Row, column: &str, property: &str) -> Result<f64> {
    row.get_value(column)?.as_f64().ok_or_else(|| {
        HypographError::validation(format!("property '{}' holds a non-numeric value", property))
    })
}

fn sorted_distinct<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut out: Vec<Value> = values.cloned().collect();
    out.sort_by(compare_values);
    out.dedup_by(|a, b| compare_values(a, b) == Ordering::Equal);
    out
}

/// Total order on JSON values: null < booleans < numbers < strings < others.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryGraph, NodeRecord};
    use crate::test_helpers::{chain_with_weights, people, spec};
    use serde_json::json;

    #[tokio::test]
    async fn test_z_test_uses_filtered_density() {
        let suite = HypothesisTestingSuite::new(Arc::new(chain_with_weights()));
        let result = suite
            .z_test_density(0.5, 4, &SubgraphSpec::all(), None)
            .await
            .unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!((result.p_value - 1.0).abs() < 1e-12);

        let degenerate = suite
            .z_test_density(0.5, 1, &SubgraphSpec::all(), None)
            .await
            .unwrap();
        assert_eq!((degenerate.statistic, degenerate.p_value), (0.0, 1.0));
    }

    #[tokio::test]
    async fn test_weighted_z_test_bounds_weights() {
        let suite = HypothesisTestingSuite::new(Arc::new(chain_with_weights()));
        let ok = suite
            .z_test_density(0.25, 4, &SubgraphSpec::all(), Some("weight"))
            .await
            .unwrap();
        assert!(ok.statistic.abs() < 1e-12);

        let err = suite
            .z_test_density(0.25, 4, &SubgraphSpec::all(), Some("rank_gap"))
            .await
            .unwrap_err();
        assert!(matches!(err, HypographError::Validation(_)));
    }

    #[tokio::test]
    async fn test_anova_across_teams() {
        let suite = HypothesisTestingSuite::new(Arc::new(people()));
        let result = suite
            .anova_test("team", "score", &Predicate::True)
            .await
            .unwrap();
        assert!(result.statistic > 10.0);
        assert!(result.p_value < 0.01);
    }

    #[tokio::test]
    async fn test_anova_single_group_is_validation_error() {
        let suite = HypothesisTestingSuite::new(Arc::new(people()));
        let err = suite
            .anova_test("team", "score", &Predicate::parse("n.team = 'red'").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, HypographError::Validation(_)));
    }

    #[tokio::test]
    async fn test_anova_groups_integer_and_float_values_together() {
        let graph = MemoryGraph::new();
        for (id, tier, score) in [("p", json!(1), 2.0), ("q", json!(1.0), 3.0), ("r", json!(1), 4.0)] {
            graph
                .add_node(NodeRecord::new(id, &["Person"], json!({ "tier": tier, "score": score })))
                .await;
        }
        let suite = HypothesisTestingSuite::new(Arc::new(graph));
        let err = suite
            .anova_test("tier", "score", &Predicate::True)
            .await
            .unwrap_err();
        assert!(matches!(err, HypographError::Validation(_)));
    }

    #[tokio::test]
    async fn test_chi_square_table_orientation() {
        let suite = HypothesisTestingSuite::new(Arc::new(people()));
        let result = suite
            .chi_square_test("team", "senior", &Predicate::True)
            .await
            .unwrap();
        assert_eq!(result.row_values, vec![json!("blue"), json!("red")]);
        assert_eq!(result.column_values, vec![json!(false), json!(true)]);
        assert_eq!(result.degrees_of_freedom, 1);
        assert_eq!(result.expected.len(), 2);
        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
    }

    #[tokio::test]
    async fn test_correlation_linear_pairs() {
        let graph = MemoryGraph::new();
        for (i, (x, y)) in [(1, 2), (2, 4), (3, 6)].into_iter().enumerate() {
            graph
                .add_node(NodeRecord::new(format!("p{}", i), &["Point"], json!({"x": x, "y": y})))
                .await;
        }
        let suite = HypothesisTestingSuite::new(Arc::new(graph));
        for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
            let result = suite
                .correlation_test("x", "y", method, &Predicate::True)
                .await
                .unwrap();
            assert!((result.coefficient - 1.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_correlation_with_too_few_pairs() {
        let suite = HypothesisTestingSuite::new(Arc::new(people()));
        let result = suite
            .correlation_test("age", "score", CorrelationMethod::Pearson, &spec("n.age > 100").node_filter)
            .await
            .unwrap();
        assert_eq!((result.coefficient, result.p_value), (0.0, 1.0));
    }

    #[test]
    fn test_correlation_method_from_str() {
        assert_eq!("Spearman".parse::<CorrelationMethod>().unwrap(), CorrelationMethod::Spearman);
        assert!("kendall".parse::<CorrelationMethod>().is_err());
    }

    #[test]
    fn test_compare_values_orders_mixed_types() {
        let mut values = vec![json!("b"), json!(2), json!(null), json!(true), json!(1.5), json!("a")];
        values.sort_by(compare_values);
        assert_eq!(
            values,
            vec![json!(null), json!(true), json!(1.5), json!(2), json!("a"), json!("b")]
        );
    }
}
