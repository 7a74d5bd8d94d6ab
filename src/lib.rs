//! Hypograph
//!
//! Descriptive and inferential statistics over filtered induced subgraphs of
//! a property graph:
//! - Filter predicates propagated to every endpoint a traversal touches
//! - Structured aggregation requests rendered to Cypher or evaluated in memory
//! - Density, degree distribution, centralities, communities and modularity
//! - z-test, ANOVA, chi-square, correlation and beta-binomial density estimates

pub mod adapter;
pub mod error;
pub mod graph;
pub mod predicate;
pub mod query;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use adapter::{CypherAdapter, GraphAdapter, MemoryGraph};
pub use error::{HypographError, Result};
pub use predicate::{Predicate, PredicateRewriter};
pub use query::{Direction, SubgraphQueryBuilder, SubgraphSpec};
pub use stats::{
    AlgorithmResult, CommunityAnalyzer, HypothesisTestingSuite, ResultSource, StatsSettings,
    StructuralStatistics,
};

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub adapter: AdapterYamlConfig,
    pub stats: StatsSettings,
}

/// Which [`GraphAdapter`] a [`Hypograph`] is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Neo4j over Bolt, GDS procedures for native algorithms.
    #[default]
    Cypher,
    /// In-process [`MemoryGraph`].
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = HypographError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cypher" | "neo4j" => Ok(Self::Cypher),
            "memory" => Ok(Self::Memory),
            other => Err(HypographError::validation(format!(
                "unknown backend '{}'",
                other
            ))),
        }
    }
}

/// Adapter configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterYamlConfig {
    pub backend: Backend,
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for AdapterYamlConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Cypher,
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "neo4j".into(),
        }
    }
}

// ============================================================================
// Runtime config
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub stats: StatsSettings,
}

impl Config {
    /// Equivalent to `from_yaml_and_env(None)`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default. Without a path, `hypograph.yaml`
    /// in the working directory is tried.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> anyhow::Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let backend = match std::env::var("HYPOGRAPH_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => yaml.adapter.backend,
        };

        Ok(Self {
            backend,
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.adapter.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.adapter.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.adapter.password),
            stats: yaml.stats,
        })
    }

    /// Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("hypograph.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Facade
// ============================================================================

/// An adapter bundled with the analyzers that share it.
#[derive(Clone)]
pub struct Hypograph {
    adapter: Arc<dyn GraphAdapter>,
    settings: StatsSettings,
}

impl Hypograph {
    /// Build the adapter selected by `config.backend`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let adapter: Arc<dyn GraphAdapter> = match config.backend {
            Backend::Cypher => Arc::new(
                CypherAdapter::connect(
                    &config.neo4j_uri,
                    &config.neo4j_user,
                    &config.neo4j_password,
                )
                .await?,
            ),
            Backend::Memory => {
                tracing::info!("Using in-memory graph");
                Arc::new(MemoryGraph::new())
            }
        };
        Ok(Self::with_adapter(adapter, config.stats))
    }

    pub fn with_adapter(adapter: Arc<dyn GraphAdapter>, settings: StatsSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn adapter(&self) -> Arc<dyn GraphAdapter> {
        self.adapter.clone()
    }

    pub fn settings(&self) -> StatsSettings {
        self.settings
    }

    pub fn structural(&self) -> StructuralStatistics {
        StructuralStatistics::with_settings(self.adapter.clone(), self.settings)
    }

    pub fn community(&self) -> CommunityAnalyzer {
        CommunityAnalyzer::with_settings(self.adapter.clone(), self.settings)
    }

    pub fn hypothesis(&self) -> HypothesisTestingSuite {
        HypothesisTestingSuite::with_settings(self.adapter.clone(), self.settings)
    }

    pub async fn close(&self) -> Result<()> {
        self.adapter.close().await
    }
}

// ============================================================================
// Tests
// ============================================================================
