//! Graph store adapters.
//!
//! ## Modules
//!
//! - [`traits`]: [`GraphAdapter`] trait, row and record types
//! - [`cypher`]: [`CypherAdapter`]: Neo4j over Bolt
//! - [`memory`]: [`MemoryGraph`]: in-process property graph

pub mod cypher;
pub mod memory;
pub mod traits;

pub use cypher::CypherAdapter;
pub use memory::MemoryGraph;
pub use traits::{EdgeRecord, GraphAdapter, NodeRecord, Row, RowExt};
