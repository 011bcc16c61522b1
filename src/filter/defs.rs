use serde::{Deserialize, Serialize};

use crate::db::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    String,
    Number,
    Select,
    Node,
    Date,
    HDate,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::String => "string",
            FilterType::Number => "number",
            FilterType::Select => "select",
            FilterType::Node => "node",
            FilterType::Date => "date",
            FilterType::HDate => "hdate",
        }
    }

    /// Types whose values are matched as text.
    pub fn is_textual(&self) -> bool {
        matches!(self, FilterType::String | FilterType::Select | FilterType::Node | FilterType::Date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    NoOp,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::NoOp => "no-op",
            Operator::Contains => "contains",
            Operator::NotContains => "not-contains",
            Operator::IsEmpty => "is-empty",
            Operator::IsNotEmpty => "is-not-empty",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
        }
    }

    /// Short form used in filter summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Operator::NoOp => "--",
            Operator::Contains => "contains",
            Operator::NotContains => "does not contain",
            Operator::IsEmpty => "is empty",
            Operator::IsNotEmpty => "is not empty",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "=",
            Operator::Neq => "!=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte | Operator::Eq | Operator::Neq
        )
    }

    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::NoOp | Operator::IsEmpty | Operator::IsNotEmpty)
    }

    pub fn valid_for(&self, filter_type: FilterType) -> bool {
        match self {
            Operator::NoOp | Operator::IsEmpty | Operator::IsNotEmpty => true,
            Operator::Contains | Operator::NotContains => filter_type.is_textual(),
            _ => matches!(filter_type, FilterType::Number | FilterType::HDate),
        }
    }
}

/// One filter row: a field, an operator and the value the user typed.
///
/// `operator` and `value` are optional because hand-edited or partially
/// imported definitions can lack them; such filters never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub keylabel: String,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FilterDefinition {
    pub fn new(id: &str, key: &str, filter_type: FilterType, operator: Operator, value: &str) -> Self {
        Self {
            id: id.to_string(),
            key: key.to_string(),
            filter_type,
            keylabel: key.to_string(),
            operator: Some(operator),
            value: Some(value.to_string()),
            options: Vec::new(),
        }
    }

    pub fn is_no_op(&self) -> bool {
        self.operator == Some(Operator::NoOp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterGroupKind {
    Nodes,
    Edges,
}

impl FilterGroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterGroupKind::Nodes => "nodes",
            FilterGroupKind::Edges => "edges",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    pub transparency: f64,      // Applied to unmatched items in FADE
}

impl FilterGroup {
    pub fn new(transparency: f64) -> Self {
        Self { filters: Vec::new(), transparency }
    }

    pub fn active(&self) -> impl Iterator<Item = &FilterDefinition> {
        self.filters.iter().filter(|f| !f.is_no_op())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusDef {
    #[serde(default)]
    pub source: Option<NodeId>,
    #[serde(rename = "sourceLabel", default)]
    pub source_label: String,
    pub range: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterAction {
    /// Hide unmatched nodes; metrics stay those of the full graph
    Filter,
    /// Keep everything, fade what does not match
    #[default]
    Fade,
    /// Remove unmatched nodes and recompute metrics on what is left
    Reduce,
    /// Keep only nodes within `focus.range` hops of `focus.source`
    Focus,
}

impl FilterAction {
    pub fn removes(&self) -> bool {
        !matches!(self, FilterAction::Fade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefs {
    pub nodes: FilterGroup,
    pub edges: FilterGroup,
    pub focus: FocusDef,
    #[serde(rename = "filterAction", default)]
    pub filter_action: FilterAction,
}

impl FilterDefs {
    pub fn new(node_transparency: f64, edge_transparency: f64, focus_range: u32) -> Self {
        Self {
            nodes: FilterGroup::new(node_transparency),
            edges: FilterGroup::new(edge_transparency),
            focus: FocusDef { source: None, source_label: String::new(), range: focus_range },
            filter_action: FilterAction::default(),
        }
    }

    pub fn group(&self, kind: FilterGroupKind) -> &FilterGroup {
        match kind {
            FilterGroupKind::Nodes => &self.nodes,
            FilterGroupKind::Edges => &self.edges,
        }
    }

    pub fn group_mut(&mut self, kind: FilterGroupKind) -> &mut FilterGroup {
        match kind {
            FilterGroupKind::Nodes => &mut self.nodes,
            FilterGroupKind::Edges => &mut self.edges,
        }
    }

    /// True when any filter would change the view.
    pub fn is_active(&self) -> bool {
        match self.filter_action {
            FilterAction::Focus => self.focus.source.is_some(),
            _ => self.nodes.active().next().is_some() || self.edges.active().next().is_some(),
        }
    }
}

/// Partial update to the non-filter parts of `FilterDefs` (FILTERS_UPDATE).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiltersUpdate {
    #[serde(rename = "filterAction", default, skip_serializing_if = "Option::is_none")]
    pub filter_action: Option<FilterAction>,
    #[serde(rename = "nodeTransparency", default, skip_serializing_if = "Option::is_none")]
    pub node_transparency: Option<f64>,
    #[serde(rename = "edgeTransparency", default, skip_serializing_if = "Option::is_none")]
    pub edge_transparency: Option<f64>,
    #[serde(rename = "focusRange", default, skip_serializing_if = "Option::is_none")]
    pub focus_range: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_wire_names() {
        let ops: Vec<Operator> = serde_json::from_str(r#"["no-op", "not-contains", "is-not-empty", "gte"]"#).unwrap();
        assert_eq!(ops, vec![Operator::NoOp, Operator::NotContains, Operator::IsNotEmpty, Operator::Gte]);
        assert_eq!(serde_json::to_string(&Operator::IsEmpty).unwrap(), "\"is-empty\"");
        assert_eq!(serde_json::to_string(&FilterType::HDate).unwrap(), "\"hdate\"");
        assert_eq!(serde_json::to_string(&FilterAction::Reduce).unwrap(), "\"REDUCE\"");
    }

    #[test]
    fn test_operator_validity_per_type() {
        assert!(Operator::Contains.valid_for(FilterType::Select));
        assert!(!Operator::Contains.valid_for(FilterType::Number));
        assert!(Operator::Gt.valid_for(FilterType::HDate));
        assert!(!Operator::Lt.valid_for(FilterType::String));
        assert!(Operator::NoOp.valid_for(FilterType::Number));
        assert!(Operator::IsEmpty.valid_for(FilterType::Node));
    }

    #[test]
    fn test_missing_operator_and_value_deserialize() {
        let f: FilterDefinition = serde_json::from_str(r#"{"id": "n1", "key": "label", "type": "string"}"#).unwrap();
        assert_eq!(f.operator, None);
        assert_eq!(f.value, None);
        assert!(!f.is_no_op());
    }

    #[test]
    fn test_is_active() {
        let mut defs = FilterDefs::new(0.2, 0.2, 2);
        defs.nodes.filters.push(FilterDefinition::new("n0", "label", FilterType::String, Operator::NoOp, ""));
        assert!(!defs.is_active());
        defs.nodes.filters[0].operator = Some(Operator::Contains);
        assert!(defs.is_active());
        defs.filter_action = FilterAction::Focus;
        assert!(!defs.is_active());
        defs.focus.source = Some(1);
        assert!(defs.is_active());
    }
}
