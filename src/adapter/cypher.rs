//! Neo4j-backed adapter.
//!
//! Sends Cypher over Bolt through `neo4rs`. Native algorithms require the
//! Graph Data Science plugin; without it the store rejects the procedures and
//! the error is reported as [`HypographError::CapabilityUnavailable`].

use super::traits::{GraphAdapter, Row};
use crate::error::{HypographError, Result};
use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType, Graph, Query};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Adapter for a Neo4j server.
pub struct CypherAdapter {
    graph: RwLock<Option<Arc<Graph>>>,
}

impl CypherAdapter {
    /// Connect to a Neo4j server.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| HypographError::Connection(format!("{}: {}", uri, e)))?;
        info!("Connected to Neo4j at {}", uri);
        Ok(Self::from_graph(Arc::new(graph)))
    }

    /// Wrap an existing connection pool.
    pub fn from_graph(graph: Arc<Graph>) -> Self {
        Self {
            graph: RwLock::new(Some(graph)),
        }
    }

    async fn graph(&self) -> Result<Arc<Graph>> {
        self.graph
            .read()
            .await
            .clone()
            .ok_or_else(|| HypographError::Connection("adapter is closed".to_string()))
    }
}

#[async_trait]
impl GraphAdapter for CypherAdapter {
    async fn query(&self, text: &str, params: &Map<String, Value>) -> Result<Vec<Row>> {
        let graph = self.graph().await?;
        debug!(cypher = text, "Running statement");

        let mut q: Query = query(text);
        for (key, value) in params {
            q = q.param(key, to_bolt(value));
        }

        let mut result = graph.execute(q).await.map_err(classify)?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await.map_err(classify)? {
            let row: Row = row
                .to()
                .map_err(|e| HypographError::decode(e.to_string()))?;
            rows.push(row);
        }
        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        if self.graph.write().await.take().is_some() {
            info!("Closed Neo4j connection");
        }
        Ok(())
    }
}

/// Missing GDS procedures and functions are a capability gap, not a bad query.
fn classify(error: neo4rs::Error) -> HypographError {
    let message = error.to_string();
    if message.contains("no procedure") || message.contains("Unknown function 'gds.") {
        HypographError::CapabilityUnavailable(message)
    } else {
        HypographError::Query(message)
    }
}

/// JSON parameter to Bolt value.
fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or(f64::NAN).into(),
        },
        Value::String(s) => s.as_str().into(),
        Value::Array(items) => items.iter().map(to_bolt).collect::<Vec<BoltType>>().into(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), to_bolt(v)))
            .collect::<HashMap<String, BoltType>>()
            .into(),
    }
}
