//! GraphAdapter trait definition
//!
//! The single seam between the statistics and a graph store. Adapters run
//! raw Cypher, answer structured [`Request`]s and expose plain node and edge
//! listings. Every statistic goes through [`GraphAdapter::execute`].

use crate::error::{HypographError, Result};
use crate::query::{Request, Statement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// A node as returned by [`GraphAdapter::get_nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A relationship as returned by [`GraphAdapter::get_edges`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub rel_type: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Abstract interface over a property-graph store.
///
/// Implementations must be shareable across tasks; the statistics hold them
/// behind an `Arc<dyn GraphAdapter>`.
#[async_trait]
pub trait GraphAdapter: Send + Sync {
    /// Run one Cypher statement and collect its rows.
    async fn query(&self, text: &str, params: &Map<String, Value>) -> Result<Vec<Row>>;

    /// Answer a structured request.
    ///
    /// The default renders the request to Cypher, runs the setup statements,
    /// then the main statement, and always runs the teardown statements
    /// before returning the main statement's outcome.
    async fn execute(&self, request: &Request) -> Result<Vec<Row>> {
        let plan = request.to_cypher();
        debug!(kind = request.kind(), "Executing request");

        for statement in &plan.setup {
            if let Err(e) = self.query(&statement.text, &statement.params).await {
                run_teardown(self, &plan.teardown).await;
                return Err(e);
            }
        }
        let result = self.query(&plan.main.text, &plan.main.params).await;
        run_teardown(self, &plan.teardown).await;
        result
    }

    /// All nodes, optionally restricted to one label.
    async fn get_nodes(&self, label: Option<&str>) -> Result<Vec<NodeRecord>> {
        let text = match label {
            Some(label) => format!(
                "MATCH (n:{}) RETURN elementId(n) AS id, labels(n) AS labels, properties(n) AS properties",
                crate::predicate::escape_identifier(label)
            ),
            None => "MATCH (n) RETURN elementId(n) AS id, labels(n) AS labels, properties(n) AS properties"
                .to_string(),
        };
        self.query(&text, &Map::new())
            .await?
            .into_iter()
            .map(decode_record)
            .collect()
    }

    /// All relationships, optionally restricted to one type.
    async fn get_edges(&self, rel_type: Option<&str>) -> Result<Vec<EdgeRecord>> {
        let pattern = match rel_type {
            Some(t) => format!("(n)-[r:{}]->(m)", crate::predicate::escape_identifier(t)),
            None => "(n)-[r]->(m)".to_string(),
        };
        let text = format!(
            "MATCH {} RETURN elementId(r) AS id, type(r) AS rel_type, \
             elementId(n) AS source, elementId(m) AS target, properties(r) AS properties",
            pattern
        );
        self.query(&text, &Map::new())
            .await?
            .into_iter()
            .map(decode_record)
            .collect()
    }

    /// Release the underlying connection. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;
}

async fn run_teardown<A: GraphAdapter + ?Sized>(adapter: &A, statements: &[Statement]) {
    for statement in statements {
        if let Err(e) = adapter.query(&statement.text, &statement.params).await {
            warn!("Teardown statement failed: {}", e);
        }
    }
}

fn decode_record<T: serde::de::DeserializeOwned>(row: Row) -> Result<T> {
    serde_json::from_value(Value::Object(row)).map_err(|e| HypographError::decode(e.to_string()))
}

// ============================================================================
// Row access
// ============================================================================

/// Typed column access on result rows.
pub trait RowExt {
    fn get_value(&self, column: &str) -> Result<&Value>;

    /// Numeric column. Integers are widened.
    fn get_f64(&self, column: &str) -> Result<f64> {
        let value = self.get_value(column)?;
        value
            .as_f64()
            .ok_or_else(|| HypographError::decode(format!("column '{}' is not numeric: {}", column, value)))
    }

    /// Numeric column that may be null.
    fn get_opt_f64(&self, column: &str) -> Result<Option<f64>> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            _ => self.get_f64(column).map(Some),
        }
    }

    fn get_i64(&self, column: &str) -> Result<i64> {
        let value = self.get_value(column)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|x| x.fract() == 0.0).map(|x| x as i64))
            .ok_or_else(|| HypographError::decode(format!("column '{}' is not an integer: {}", column, value)))
    }

    fn get_bool(&self, column: &str) -> Result<bool> {
        let value = self.get_value(column)?;
        value
            .as_bool()
            .ok_or_else(|| HypographError::decode(format!("column '{}' is not a boolean: {}", column, value)))
    }

    /// Node identifier. Stores hand these out as strings or integers.
    fn get_id(&self, column: &str) -> Result<String> {
        match self.get_value(column)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(HypographError::decode(format!(
                "column '{}' is not an identifier: {}",
                column, other
            ))),
        }
    }
}

impl RowExt for Row {
    fn get_value(&self, column: &str) -> Result<&Value> {
        self.get(column)
            .ok_or_else(|| HypographError::decode(format!("missing column '{}'", column)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_row_numeric_access_widens_integers() {
        let r = row(json!({"count": 3, "total": 2.5, "missing": null}));
        assert_eq!(r.get_f64("count").unwrap(), 3.0);
        assert_eq!(r.get_i64("count").unwrap(), 3);
        assert_eq!(r.get_f64("total").unwrap(), 2.5);
        assert_eq!(r.get_opt_f64("missing").unwrap(), None);
        assert!(matches!(r.get_f64("absent"), Err(HypographError::Decode(_))));
    }

    #[test]
    fn test_row_id_accepts_strings_and_integers() {
        let r = row(json!({"a": "4:abc:7", "b": 7, "c": [1]}));
        assert_eq!(r.get_id("a").unwrap(), "4:abc:7");
        assert_eq!(r.get_id("b").unwrap(), "7");
        assert!(r.get_id("c").is_err());
    }

    #[test]
    fn test_decode_record_defaults_missing_collections() {
        let node: NodeRecord = decode_record(row(json!({"id": "1"}))).unwrap();
        assert!(node.labels.is_empty());
        assert!(node.properties.is_empty());
    }
}
