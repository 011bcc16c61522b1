//! Project template: the field schema for nodes, edges and comments.
//!
//! Only the parts this crate consumes are modeled. Field order in
//! `nodeDefs`/`edgeDefs` is significant (it becomes filter order), so the
//! defs are read through an order-preserving JSON map.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::comments::CommentType;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Select,
    Node,
    Date,
    HDate,
    Hidden,
    Timestamp,
    InfoOrigin,
    Unknown(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Node => "node",
            FieldType::Date => "date",
            FieldType::HDate => "hdate",
            FieldType::Hidden => "hidden",
            FieldType::Timestamp => "timestamp",
            FieldType::InfoOrigin => "infoOrigin",
            FieldType::Unknown(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "select" => FieldType::Select,
            "node" => FieldType::Node,
            "date" => FieldType::Date,
            "hdate" => FieldType::HDate,
            "hidden" => FieldType::Hidden,
            "timestamp" => FieldType::Timestamp,
            "infoOrigin" => FieldType::InfoOrigin,
            other => FieldType::Unknown(other.to_string()),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(FieldType::from_str(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(rename = "displayLabel", default)]
    pub display_label: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

/// Ordered `key -> FieldDef` list.
pub type FieldDefs = Vec<(String, FieldDef)>;

fn ordered_defs<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<FieldDefs, D::Error> {
    let map = Map::<String, Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(key, value)| {
            serde_json::from_value::<FieldDef>(value)
                .map(|def| (key.clone(), def))
                .map_err(|e| serde::de::Error::custom(format!("field '{}': {}", key, e)))
        })
        .collect()
}

fn serialize_defs<S: serde::Serializer>(defs: &FieldDefs, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(defs.len()))?;
    for (key, def) in defs {
        map.serialize_entry(key, def)?;
    }
    map.end()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "nodeDefs", default, deserialize_with = "ordered_defs", serialize_with = "serialize_defs")]
    pub node_defs: FieldDefs,
    #[serde(rename = "edgeDefs", default, deserialize_with = "ordered_defs", serialize_with = "serialize_defs")]
    pub edge_defs: FieldDefs,
    #[serde(rename = "commentTypes", default, skip_serializing_if = "Vec::is_empty")]
    pub comment_types: Vec<CommentType>,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn node_def(&self, key: &str) -> Option<&FieldDef> {
        self.node_defs.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }

    pub fn edge_def(&self, key: &str) -> Option<&FieldDef> {
        self.edge_defs.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r##"{
        "name": "Tacitus",
        "nodeDefs": {
            "label": {"type": "string", "displayLabel": "Label"},
            "type": {"type": "select", "displayLabel": "Type",
                     "options": [{"label": "Person", "color": "#f00"}, {"label": "Place"}]},
            "degrees": {"type": "number", "displayLabel": "Degrees"},
            "id": {"type": "number", "displayLabel": "ID", "hidden": true},
            "born": {"type": "hdate", "displayLabel": "Born"},
            "mood": {"type": "emoji", "displayLabel": "Mood"}
        },
        "edgeDefs": {
            "source": {"type": "node", "displayLabel": "Source"},
            "target": {"type": "node", "displayLabel": "Target"}
        }
    }"##;

    #[test]
    fn test_field_order_preserved() {
        let template: Template = serde_json::from_str(TEMPLATE).unwrap();
        let keys: Vec<&str> = template.node_defs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["label", "type", "degrees", "id", "born", "mood"]);
        assert_eq!(template.edge_defs.len(), 2);
    }

    #[test]
    fn test_field_types() {
        let template: Template = serde_json::from_str(TEMPLATE).unwrap();
        assert_eq!(template.node_def("born").unwrap().field_type, FieldType::HDate);
        assert_eq!(
            template.node_def("mood").unwrap().field_type,
            FieldType::Unknown("emoji".to_string())
        );
        assert!(template.node_def("id").unwrap().hidden);
        assert_eq!(template.node_def("type").unwrap().options.len(), 2);
        assert_eq!(template.edge_def("source").unwrap().field_type, FieldType::Node);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        std::fs::write(&path, TEMPLATE).unwrap();
        let template = Template::load(&path).unwrap();
        assert_eq!(template.name, "Tacitus");
        assert!(template.comment_types.is_empty());
    }
}
