//! Derived graph metrics and small shared helpers.
//!
//! Degrees and edge sizes are never authoritative: they are recomputed over
//! whatever graph (full or filtered) is about to be published.

use std::collections::HashMap;

use crate::db::{NcData, NodeId};

/// Canonical key for an unordered node pair, so (A,B) and (B,A) collapse.
pub fn edge_key(a: NodeId, b: NodeId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

/// Set `node.degrees` to the number of edge endpoints that reference the node.
/// A self-loop contributes two.
pub fn recalculate_all_node_degrees(data: &mut NcData) {
    let mut counts: HashMap<NodeId, u32> = HashMap::new();
    for edge in &data.edges {
        *counts.entry(edge.source).or_insert(0) += 1;
        *counts.entry(edge.target).or_insert(0) += 1;
    }
    for node in data.nodes.iter_mut() {
        node.degrees = counts.get(&node.id).copied().unwrap_or(0);
    }
}

/// Set `edge.size` to the summed weight of every edge sharing its unordered pair.
pub fn recalculate_all_edge_sizes(data: &mut NcData) {
    let mut sizes: HashMap<String, f64> = HashMap::new();
    for edge in &data.edges {
        *sizes.entry(edge_key(edge.source, edge.target)).or_insert(0.0) += edge.weight.unwrap_or(1.0);
    }
    for edge in data.edges.iter_mut() {
        edge.size = sizes
            .get(&edge_key(edge.source, edge.target))
            .copied()
            .unwrap_or(1.0);
    }
}

/// Safely truncate a string at a UTF-8 boundary
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if max_bytes >= s.len() { return s; }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
