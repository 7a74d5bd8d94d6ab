//! Statistics over induced subgraphs.
//!
//! Every analyzer is a stateless request → aggregate → compute pipeline over
//! a shared [`GraphAdapter`]. Requests are built by the
//! [`SubgraphQueryBuilder`](crate::query::SubgraphQueryBuilder), so every
//! aggregate reflects the induced subgraph of its [`SubgraphSpec`](crate::query::SubgraphSpec).
//!
//! ## Modules
//!
//! - [`structural`]: density, degree distribution, centralities
//! - [`community`]: community detection and modularity
//! - [`hypothesis`]: z-test, ANOVA, chi-square, correlation
//! - [`bayesian`]: beta-binomial density estimate and Bayes factor
//! - [`estimators`]: pure math shared by the above

pub mod bayesian;
pub mod community;
pub mod estimators;
pub mod hypothesis;
pub mod structural;

pub use bayesian::DensityPosterior;
pub use community::{CommunityAnalyzer, CommunitySummary};
pub use hypothesis::{
    ChiSquareResult, CorrelationMethod, CorrelationResult, HypothesisTestingSuite, TestResult,
};
pub use structural::{DegreeBucket, StructuralStatistics};

use crate::adapter::{GraphAdapter, Row, RowExt};
use crate::error::{HypographError, Result};
use crate::predicate::Predicate;
use crate::query::{Request, SubgraphQueryBuilder, SubgraphSpec};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Settings
// ============================================================================

/// Defaults for parameters the analyzers do not take on every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    pub pagerank_damping: f64,
    pub pagerank_iterations: u32,
    pub label_propagation_iterations: u32,
    pub alpha_prior: f64,
    pub beta_prior: f64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            pagerank_damping: 0.85,
            pagerank_iterations: 20,
            label_propagation_iterations: 10,
            alpha_prior: 1.0,
            beta_prior: 1.0,
        }
    }
}

// ============================================================================
// Native algorithm results
// ============================================================================

/// Where an algorithm result came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultSource {
    /// Computed by the store's native algorithm over the induced subgraph.
    Native,
    /// The native algorithm was unavailable or failed; `reason` says why.
    Fallback { reason: String },
}

/// A value tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResult<T> {
    pub value: T,
    pub source: ResultSource,
}

impl<T> AlgorithmResult<T> {
    pub fn native(value: T) -> Self {
        Self {
            value,
            source: ResultSource::Native,
        }
    }

    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            source: ResultSource::Fallback {
                reason: reason.into(),
            },
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.source, ResultSource::Native)
    }
}

/// Outcome of a native algorithm request.
pub(crate) enum Native {
    Rows(Vec<Row>),
    Unavailable(String),
}

/// Run a native algorithm request. Connection failures propagate; any other
/// failure becomes [`Native::Unavailable`] so the caller can fall back.
pub(crate) async fn run_native(adapter: &dyn GraphAdapter, request: &Request) -> Result<Native> {
    match adapter.execute(request).await {
        Ok(rows) => Ok(Native::Rows(rows)),
        Err(e @ HypographError::Connection(_)) => Err(e),
        Err(e) => {
            warn!("Native algorithm unavailable, falling back: {}", e);
            Ok(Native::Unavailable(e.to_string()))
        }
    }
}

// ============================================================================
// Shared aggregates
// ============================================================================

/// Number of nodes satisfying `filter`.
pub(crate) async fn node_count(
    adapter: &dyn GraphAdapter,
    builder: &SubgraphQueryBuilder,
    filter: &Predicate,
) -> Result<u64> {
    let rows = adapter.execute(&builder.node_count_query(filter)).await?;
    let count = match rows.first() {
        Some(row) => row.get_i64("count")?,
        None => 0,
    };
    Ok(count.max(0) as u64)
}

/// Induced edge count, or weight sum when `weight` is given.
pub(crate) async fn edge_total(
    adapter: &dyn GraphAdapter,
    builder: &SubgraphQueryBuilder,
    spec: &SubgraphSpec,
    weight: Option<&str>,
) -> Result<f64> {
    let rows = adapter.execute(&builder.edge_total_query(spec, weight)).await?;
    match rows.first() {
        Some(row) => Ok(row.get_opt_f64("total")?.unwrap_or(0.0)),
        None => Ok(0.0),
    }
}
