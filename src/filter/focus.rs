//! Graph distance from a focus node ("bacon value").

use std::collections::HashSet;

use crate::db::{Edge, NcData, NodeId};

/// One expansion step: every node adjacent to `frontier` (either edge
/// direction) that is not in `seen` joins the next frontier. Newly found
/// nodes are added to `seen`.
pub fn expand_frontier(edges: &[Edge], frontier: &HashSet<NodeId>, seen: &mut HashSet<NodeId>) -> HashSet<NodeId> {
    let mut next = HashSet::new();
    for edge in edges {
        let neighbor = if frontier.contains(&edge.source) {
            Some(edge.target)
        } else if frontier.contains(&edge.target) {
            Some(edge.source)
        } else {
            None
        };
        if let Some(id) = neighbor {
            if seen.insert(id) {
                next.insert(id);
            }
        }
    }
    next
}

/// Recompute `bacon_value` for every node: 0 for `source`, d for nodes d
/// hops away, None beyond `range` or when unreachable. Values from any
/// previous run are cleared first.
///
/// Returns the number of nodes that received a value.
pub fn set_bacon_values(data: &mut NcData, source: NodeId, range: u32) -> usize {
    for node in data.nodes.iter_mut() {
        node.bacon_value = None;
    }
    let Some(source_node) = data.node_mut(source) else {
        tracing::debug!("focus source {} is not in the graph", source);
        return 0;
    };
    source_node.bacon_value = Some(0);

    let node_ids: HashSet<NodeId> = data.nodes.iter().map(|n| n.id).collect();
    let mut seen: HashSet<NodeId> = HashSet::from([source]);
    let mut frontier: HashSet<NodeId> = HashSet::from([source]);
    let mut assigned = 1;
    let mut depth = 1;

    while depth <= range {
        let next = expand_frontier(&data.edges, &frontier, &mut seen);
        if next.is_empty() {
            break;
        }
        for node in data.nodes.iter_mut().filter(|n| next.contains(&n.id)) {
            node.bacon_value = Some(depth);
            assigned += 1;
        }
        // Edge endpoints missing from the node list do not expand further
        frontier = next.into_iter().filter(|id| node_ids.contains(id)).collect();
        depth += 1;
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Node;

    fn chain(len: u64) -> NcData {
        let nodes = (1..=len).map(|i| Node::new(i, &format!("n{}", i))).collect();
        let edges = (1..len).map(|i| Edge::new(100 + i, i, i + 1)).collect();
        NcData::new(nodes, edges)
    }

    fn bacon(data: &NcData, id: NodeId) -> Option<u32> {
        data.node(id).and_then(|n| n.bacon_value)
    }

    #[test]
    fn test_chain_within_range() {
        let mut data = chain(3);
        let assigned = set_bacon_values(&mut data, 1, 2);
        assert_eq!(assigned, 3);
        assert_eq!(bacon(&data, 1), Some(0));
        assert_eq!(bacon(&data, 2), Some(1));
        assert_eq!(bacon(&data, 3), Some(2));
    }

    #[test]
    fn test_range_limits_depth() {
        let mut data = chain(3);
        set_bacon_values(&mut data, 1, 1);
        assert_eq!(bacon(&data, 2), Some(1));
        assert_eq!(bacon(&data, 3), None);
    }

    #[test]
    fn test_edges_walked_in_both_directions() {
        let mut data = chain(3);
        set_bacon_values(&mut data, 3, 5);
        assert_eq!(bacon(&data, 1), Some(2));
    }

    #[test]
    fn test_shortest_distance_wins() {
        // 1-2-3-4 plus a shortcut 1-4
        let mut data = chain(4);
        data.edges.push(Edge::new(200, 1, 4));
        set_bacon_values(&mut data, 1, 3);
        assert_eq!(bacon(&data, 4), Some(1));
        assert_eq!(bacon(&data, 3), Some(2));
    }

    #[test]
    fn test_previous_values_cleared() {
        let mut data = chain(3);
        set_bacon_values(&mut data, 1, 2);
        set_bacon_values(&mut data, 3, 0);
        assert_eq!(bacon(&data, 1), None);
        assert_eq!(bacon(&data, 2), None);
        assert_eq!(bacon(&data, 3), Some(0));
    }

    #[test]
    fn test_unknown_source_and_unreachable_nodes() {
        let mut data = chain(2);
        data.nodes.push(Node::new(9, "island"));
        assert_eq!(set_bacon_values(&mut data, 42, 3), 0);
        assert!(data.nodes.iter().all(|n| n.bacon_value.is_none()));

        set_bacon_values(&mut data, 1, 10);
        assert_eq!(bacon(&data, 9), None);
    }
}
