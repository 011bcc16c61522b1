//! Filter definition lifecycle: import from the template, user edits,
//! clearing back to the imported state, and republishing the filtered view.

use super::defs::{
    FilterDefinition, FilterDefs, FilterGroup, FilterGroupKind, FilterType, FiltersUpdate, Operator,
};
use super::engine::{apply_filters, FilterOutcome};
use crate::app_state::AppState;
use crate::db::NodeId;
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::template::{FieldDefs, FieldType, Template};
use crate::utils::safe_truncate;

const SUMMARY_VALUE_MAX: usize = 40;

pub struct FilterMgr {
    defaults: FilterDefs,
    /// FILTERDEFS as imported, restored by `clear_filters`
    pristine: FilterDefs,
}

fn filter_type_for(field_type: &FieldType) -> Option<FilterType> {
    match field_type {
        FieldType::String => Some(FilterType::String),
        FieldType::Number => Some(FilterType::Number),
        FieldType::Select => Some(FilterType::Select),
        FieldType::Node => Some(FilterType::Node),
        FieldType::Date => Some(FilterType::Date),
        FieldType::HDate => Some(FilterType::HDate),
        _ => None,
    }
}

fn import_group(defs: &FieldDefs, kind: FilterGroupKind, transparency: f64) -> FilterGroup {
    let prefix = match kind {
        FilterGroupKind::Nodes => "n",
        FilterGroupKind::Edges => "e",
    };
    let mut group = FilterGroup::new(transparency);
    for (key, def) in defs {
        if def.hidden {
            continue;
        }
        let filter_type = match &def.field_type {
            FieldType::Hidden | FieldType::Timestamp | FieldType::InfoOrigin => continue,
            other => match filter_type_for(other) {
                Some(t) => t,
                None => {
                    tracing::warn!(
                        "unknown filter type '{}' for {} field '{}', skipping",
                        other.as_str(),
                        kind.as_str(),
                        key
                    );
                    continue;
                }
            },
        };
        let keylabel = if def.display_label.is_empty() { key.clone() } else { def.display_label.clone() };
        group.filters.push(FilterDefinition {
            id: format!("{}{}", prefix, group.filters.len()),
            key: key.clone(),
            filter_type,
            keylabel,
            operator: Some(Operator::NoOp),
            value: Some(String::new()),
            options: def.options.iter().map(|o| o.label.clone()).collect(),
        });
    }
    group
}

impl FilterMgr {
    pub fn new(settings: &Settings) -> Self {
        let defaults = settings.empty_filter_defs();
        Self { pristine: defaults.clone(), defaults }
    }

    /// Build fresh FILTERDEFS for a template: one `no-op` filter per visible
    /// node and edge field, in template order.
    pub fn build_filters(&self, template: &Template) -> FilterDefs {
        let mut defs = self.defaults.clone();
        defs.nodes = import_group(&template.node_defs, FilterGroupKind::Nodes, self.defaults.nodes.transparency);
        defs.edges = import_group(&template.edge_defs, FilterGroupKind::Edges, self.defaults.edges.transparency);
        defs
    }

    /// Import filters from the template, remember them as the pristine
    /// snapshot, publish and re-apply.
    pub fn import_filters(&mut self, template: &Template, state: &AppState) -> FilterOutcome {
        let defs = self.build_filters(template);
        tracing::debug!(
            "imported {} node and {} edge filters from template '{}'",
            defs.nodes.filters.len(),
            defs.edges.filters.len(),
            template.name
        );
        self.pristine = defs.clone();
        state.set_filter_defs(defs);
        self.apply(state)
    }

    pub fn pristine(&self) -> &FilterDefs {
        &self.pristine
    }

    /// Replace the filter with the same id in `group` (FILTER_DEFINE).
    pub fn define_filter(&self, state: &AppState, group: FilterGroupKind, filter: FilterDefinition) -> Result<FilterOutcome> {
        if let Some(op) = filter.operator {
            if !op.valid_for(filter.filter_type) {
                tracing::warn!(
                    "operator '{}' does not apply to {} filter '{}'",
                    op.as_str(),
                    filter.filter_type.as_str(),
                    filter.id
                );
                return Err(Error::InvalidOperator {
                    filter_type: filter.filter_type.as_str().to_string(),
                    operator: op.as_str().to_string(),
                });
            }
        }

        let mut defs = FilterDefs::clone(&state.filter_defs());
        let slot = defs
            .group_mut(group)
            .filters
            .iter_mut()
            .find(|f| f.id == filter.id)
            .ok_or_else(|| Error::UnknownFilter {
                group: group.as_str().to_string(),
                id: filter.id.clone(),
            })?;
        *slot = filter;
        state.set_filter_defs(defs);
        Ok(self.apply(state))
    }

    /// Change the action, transparencies or focus range (FILTERS_UPDATE).
    pub fn update_filters(&self, state: &AppState, update: FiltersUpdate) -> FilterOutcome {
        let mut defs = FilterDefs::clone(&state.filter_defs());
        if let Some(action) = update.filter_action {
            defs.filter_action = action;
        }
        if let Some(t) = update.node_transparency {
            defs.nodes.transparency = t.clamp(0.0, 1.0);
        }
        if let Some(t) = update.edge_transparency {
            defs.edges.transparency = t.clamp(0.0, 1.0);
        }
        if let Some(range) = update.focus_range {
            defs.focus.range = range;
        }
        state.set_filter_defs(defs);
        self.apply(state)
    }

    /// Set (or clear) the focus node; its label is looked up in NCDATA.
    pub fn set_focus_source(&self, state: &AppState, source: Option<NodeId>) -> Result<FilterOutcome> {
        let label = match source {
            Some(id) => state
                .ncdata()
                .node_label(id)
                .map(str::to_string)
                .ok_or(Error::UnknownNode(id))?,
            None => String::new(),
        };
        let mut defs = FilterDefs::clone(&state.filter_defs());
        defs.focus.source = source;
        defs.focus.source_label = label;
        state.set_filter_defs(defs);
        Ok(self.apply(state))
    }

    /// Restore FILTERDEFS to the imported snapshot (FILTER_CLEAR).
    pub fn clear_filters(&self, state: &AppState) -> FilterOutcome {
        state.set_filter_defs(self.pristine.clone());
        self.apply(state)
    }

    /// Recompute FILTEREDNCDATA from NCDATA and FILTERDEFS and publish it.
    pub fn apply(&self, state: &AppState) -> FilterOutcome {
        let outcome = apply_filters(&state.filter_defs(), &state.ncdata());
        state.set_filtered_ncdata(outcome.data.clone());
        outcome
    }

    /// Human-readable description of what the current filters do.
    /// Empty when nothing is filtered.
    pub fn summary(defs: &FilterDefs) -> String {
        use super::defs::FilterAction;

        if !defs.is_active() {
            return String::new();
        }
        if defs.filter_action == FilterAction::Focus {
            return format!(
                "Focus on \"{}\" within {} hop{}",
                defs.focus.source_label,
                defs.focus.range,
                if defs.focus.range == 1 { "" } else { "s" }
            );
        }

        let verb = match defs.filter_action {
            FilterAction::Filter => "Showing",
            FilterAction::Fade => "Highlighting",
            FilterAction::Reduce | FilterAction::Focus => "Reducing to",
        };
        let describe = |f: &FilterDefinition| {
            let op = f.operator.map(|o| o.label()).unwrap_or("?");
            match (&f.value, f.operator) {
                (Some(v), Some(o)) if o.takes_value() => {
                    format!("{} {} \"{}\"", f.keylabel, op, safe_truncate(v, SUMMARY_VALUE_MAX))
                }
                _ => format!("{} {}", f.keylabel, op),
            }
        };
        let mut parts = Vec::new();
        let nodes: Vec<String> = defs.nodes.active().map(describe).collect();
        if !nodes.is_empty() {
            parts.push(format!("nodes where {}", nodes.join(" AND ")));
        }
        let edges: Vec<String> = defs.edges.active().map(describe).collect();
        if !edges.is_empty() {
            parts.push(format!("edges where {}", edges.join(" AND ")));
        }
        format!("{} {}", verb, parts.join("; "))
    }
}
