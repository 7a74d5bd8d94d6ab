//! Seeded in-memory graphs shared by unit tests.

use crate::adapter::{EdgeRecord, MemoryGraph, NodeRecord};
use crate::query::SubgraphSpec;
use serde_json::json;

/// Node-filtered spec over the whole edge set, `BOTH` direction.
pub fn spec(node_filter: &str) -> SubgraphSpec {
    SubgraphSpec::parse(Some(node_filter), None).unwrap()
}

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("hypograph=debug"))
        .with_test_writer()
        .try_init();
}

/// `a → b → c → d`, every edge with `weight: 0.5` and `rank_gap: 2.0`.
///
/// Nodes are `Item`s with `rank` 0..=3 in chain order.
pub fn chain_with_weights() -> MemoryGraph {
    let ids = ["a", "b", "c", "d"];
    let nodes = ids
        .iter()
        .enumerate()
        .map(|(rank, id)| NodeRecord::new(*id, &["Item"], json!({ "rank": rank })))
        .collect();
    let edges = ids
        .windows(2)
        .map(|pair| {
            EdgeRecord::new(
                format!("{}{}", pair[0], pair[1]),
                "NEXT",
                pair[0],
                pair[1],
                json!({ "weight": 0.5, "rank_gap": 2.0 }),
            )
        })
        .collect();
    MemoryGraph::from_records(nodes, edges).unwrap()
}

/// `n1 → n2`, `n1 → n3`. Each node's `name` is its id.
pub fn path_of_three() -> MemoryGraph {
    let nodes = ["n1", "n2", "n3"]
        .iter()
        .map(|id| NodeRecord::new(*id, &["Node"], json!({ "name": id })))
        .collect();
    let edges = vec![
        EdgeRecord::new("e12", "LINKS", "n1", "n2", json!({})),
        EdgeRecord::new("e13", "LINKS", "n1", "n3", json!({})),
    ];
    MemoryGraph::from_records(nodes, edges).unwrap()
}

/// Two disjoint directed triangles, groups `a` and `b`.
///
/// Every node also carries `everyone: 1`, a single-community partition.
pub fn two_triangles() -> MemoryGraph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for group in ["a", "b"] {
        for i in 0..3 {
            nodes.push(NodeRecord::new(
                format!("{}{}", group, i),
                &["Member"],
                json!({ "group": group, "everyone": 1 }),
            ));
            let (from, to) = (format!("{}{}", group, i), format!("{}{}", group, (i + 1) % 3));
            edges.push(EdgeRecord::new(
                format!("{}-{}", from, to),
                "KNOWS",
                from,
                to,
                json!({}),
            ));
        }
    }
    MemoryGraph::from_records(nodes, edges).unwrap()
}

/// Six `Person` nodes split into `red` (scores 1..=3) and `blue` (10..=12)
/// teams, with a `senior` flag and an `age` under 100.
pub fn people() -> MemoryGraph {
    let rows = [
        ("r1", "red", 1, true, 31),
        ("r2", "red", 2, false, 24),
        ("r3", "red", 3, false, 45),
        ("b1", "blue", 10, true, 52),
        ("b2", "blue", 11, true, 38),
        ("b3", "blue", 12, false, 29),
    ];
    let nodes = rows
        .iter()
        .map(|(id, team, score, senior, age)| {
            NodeRecord::new(
                *id,
                &["Person"],
                json!({ "team": team, "score": score, "senior": senior, "age": age }),
            )
        })
        .collect();
    MemoryGraph::from_records(nodes, Vec::new()).unwrap()
}
