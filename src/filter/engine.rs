//! Derives FILTEREDNCDATA from NCDATA and the current filter definitions.
//!
//! Pure computation: the input graph is never modified, the view is a fresh
//! copy annotated with labels, transparencies, bacon values and metrics.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde_json::{json, Value};

use super::defs::{FilterAction, FilterDefs, FilterGroup, FilterType};
use super::focus::set_bacon_values;
use super::matching::FilterPredicate;
use crate::db::{Edge, NcData, Node, NodeId};
use crate::utils::{recalculate_all_edge_sizes, recalculate_all_node_degrees};

/// Opacity of anything that is not faded.
pub const OPAQUE: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub data: NcData,
    /// Nodes dropped by FILTER, REDUCE or FOCUS, sorted. Edges touching
    /// them are dropped as well.
    pub removed_nodes: Vec<NodeId>,
}

/// Resolve a node field by filter key: built-in properties first, then
/// template attributes.
pub fn node_field(node: &Node, key: &str) -> Option<Value> {
    match key {
        "id" => Some(json!(node.id)),
        "label" => Some(json!(node.label)),
        "type" => Some(json!(node.node_type)),
        "degrees" => Some(json!(node.degrees)),
        "created" => Some(json!(node.meta.created)),
        "updated" => Some(json!(node.meta.updated)),
        "revision" => Some(json!(node.meta.revision)),
        _ => node.attributes.get(key).cloned(),
    }
}

/// Resolve an edge field. `source`/`target` resolve to the endpoint label
/// for text filters and to the endpoint id otherwise.
pub fn edge_field(edge: &Edge, key: &str, filter_type: FilterType) -> Option<Value> {
    match key {
        "id" => Some(json!(edge.id)),
        "source" if filter_type.is_textual() => edge.source_label.as_ref().map(|l| json!(l)),
        "target" if filter_type.is_textual() => edge.target_label.as_ref().map(|l| json!(l)),
        "source" => Some(json!(edge.source)),
        "target" => Some(json!(edge.target)),
        "type" => Some(json!(edge.edge_type)),
        "weight" => edge.weight.map(|w| json!(w)),
        "size" => Some(json!(edge.size)),
        _ => edge.attributes.get(key).cloned(),
    }
}

fn compile(group: &FilterGroup) -> Vec<FilterPredicate<'_>> {
    group.active().map(FilterPredicate::new).collect()
}

fn node_matches(node: &Node, predicates: &[FilterPredicate]) -> bool {
    predicates
        .iter()
        .all(|p| p.test(node_field(node, &p.filter().key).as_ref()))
}

fn edge_matches(edge: &Edge, predicates: &[FilterPredicate]) -> bool {
    predicates.iter().all(|p| {
        let filter = p.filter();
        p.test(edge_field(edge, &filter.key, filter.filter_type).as_ref())
    })
}

/// Write `sourceLabel`/`targetLabel` onto every edge so string filters on
/// endpoints do not need a node lookup per evaluation.
pub fn annotate_edge_labels(data: &mut NcData) {
    let labels: HashMap<NodeId, String> = data.nodes.iter().map(|n| (n.id, n.label.clone())).collect();
    for edge in data.edges.iter_mut() {
        edge.source_label = labels.get(&edge.source).cloned();
        edge.target_label = labels.get(&edge.target).cloned();
    }
}

/// Apply `defs` to `ncdata`.
///
/// - FILTER drops unmatched nodes; degrees and sizes are those of the full graph.
/// - FADE keeps everything and sets `filteredTransparency` on unmatched nodes
///   and on edges that fail their own filters or touch a faded node.
/// - REDUCE drops unmatched nodes and recomputes metrics on what remains.
/// - FOCUS ignores field filters and keeps nodes within `focus.range` hops
///   of `focus.source` (everything when no source is set).
///
/// In every removing mode an edge is dropped with either endpoint.
pub fn apply_filters(defs: &FilterDefs, ncdata: &NcData) -> FilterOutcome {
    let start = Instant::now();
    let mut work = ncdata.clone();
    annotate_edge_labels(&mut work);
    recalculate_all_node_degrees(&mut work);
    recalculate_all_edge_sizes(&mut work);
    for node in work.nodes.iter_mut() {
        node.filtered_transparency = Some(OPAQUE);
        node.bacon_value = None;
    }
    for edge in work.edges.iter_mut() {
        edge.filtered_transparency = Some(OPAQUE);
    }

    let action = defs.filter_action;
    let mut removed: HashSet<NodeId> = HashSet::new();
    let mut faded: HashSet<NodeId> = HashSet::new();

    if action == FilterAction::Focus {
        if let Some(source) = defs.focus.source {
            let range = defs.focus.range;
            set_bacon_values(&mut work, source, range);
            removed.extend(
                work.nodes
                    .iter()
                    .filter(|n| n.bacon_value.map_or(true, |b| b > range))
                    .map(|n| n.id),
            );
        }
    } else {
        let predicates = compile(&defs.nodes);
        for node in work.nodes.iter_mut() {
            if node_matches(node, &predicates) {
                continue;
            }
            if action == FilterAction::Fade {
                node.filtered_transparency = Some(defs.nodes.transparency);
                faded.insert(node.id);
            } else {
                removed.insert(node.id);
            }
        }
    }

    work.nodes.retain(|n| !removed.contains(&n.id));
    work.edges
        .retain(|e| !removed.contains(&e.source) && !removed.contains(&e.target));

    if action != FilterAction::Focus {
        let predicates = compile(&defs.edges);
        let edge_transparency = defs.edges.transparency;
        work.edges.retain_mut(|edge| {
            let keep = edge_matches(edge, &predicates);
            if action == FilterAction::Fade {
                if !keep || faded.contains(&edge.source) || faded.contains(&edge.target) {
                    edge.filtered_transparency = Some(edge_transparency);
                }
                true
            } else {
                keep
            }
        });
    }

    if matches!(action, FilterAction::Reduce | FilterAction::Focus) {
        recalculate_all_node_degrees(&mut work);
        recalculate_all_edge_sizes(&mut work);
    }

    let mut removed_nodes: Vec<NodeId> = removed.into_iter().collect();
    removed_nodes.sort_unstable();

    tracing::debug!(
        action = ?action,
        kept_nodes = work.nodes.len(),
        kept_edges = work.edges.len(),
        removed_nodes = removed_nodes.len(),
        "filters applied in {}ms",
        start.elapsed().as_millis()
    );

    FilterOutcome { data: work, removed_nodes }
}
