//! In-process graph algorithms over projected subgraphs.
//!
//! Used by the in-memory adapter as its native algorithm implementation and
//! by the community analyzer when the store offers no native community
//! detection.
//!
//! ```text
//! induced subgraph ──► Projection (petgraph::DiGraph) ──► algorithms
//! ```
//!
//! ## Modules
//!
//! - [`models`]: [`Projection`] (petgraph wrapper with id mapping) and algorithm settings/outcomes
//! - [`algorithms`]: PageRank, betweenness, label propagation

pub mod algorithms;
pub mod models;

pub use algorithms::{betweenness_centrality, label_propagation, pagerank};
pub use models::{LabelPropagationOutcome, PageRankSettings, Projection};
