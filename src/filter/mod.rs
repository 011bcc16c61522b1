//! Filter predicate engine, focus distances and filter-definition lifecycle.

mod defs;
mod engine;
mod focus;
mod manager;
mod matching;

pub use defs::{
    FilterAction, FilterDefinition, FilterDefs, FilterGroup, FilterGroupKind, FilterType, FiltersUpdate, FocusDef,
    Operator,
};
pub use engine::{annotate_edge_labels, apply_filters, edge_field, node_field, FilterOutcome, OPAQUE};
pub use focus::{expand_frontier, set_bacon_values};
pub use manager::FilterMgr;
pub use matching::{match_hdate, match_number, match_string, FilterPredicate, StringPin};
