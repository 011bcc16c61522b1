use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type NodeId = u64;
pub type EdgeId = u64;

/// Record bookkeeping maintained by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub updated: i64,
    #[serde(default)]
    pub revision: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub degrees: u32,                     // Derived: recomputed on every filter pass
    #[serde(default)]
    pub attributes: Map<String, Value>,   // Template-defined fields (notes, info, provenance...)
    #[serde(default)]
    pub meta: Meta,

    // View-only fields, written by the filter engine
    #[serde(rename = "filteredTransparency", default, skip_serializing_if = "Option::is_none")]
    pub filtered_transparency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bacon_value: Option<u32>,
}

impl Node {
    pub fn new(id: NodeId, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            ..Default::default()
        }
    }
}

fn default_size() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type", default)]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,              // Contribution to size; None counts as 1
    #[serde(default = "default_size")]
    pub size: f64,                        // Derived: sum of weights over the unordered pair
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub meta: Meta,

    #[serde(rename = "sourceLabel", default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    #[serde(rename = "targetLabel", default, skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    #[serde(rename = "filteredTransparency", default, skip_serializing_if = "Option::is_none")]
    pub filtered_transparency: Option<f64>,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            edge_type: String::new(),
            weight: None,
            size: default_size(),
            attributes: Map::new(),
            meta: Meta::default(),
            source_label: None,
            target_label: None,
            filtered_transparency: None,
        }
    }

    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// A graph as held in NCDATA (authoritative) or FILTEREDNCDATA (derived view).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NcData {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl NcData {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn node_label(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.label.as_str())
    }

    /// Insert or replace a node by id. Returns true when an existing node was replaced.
    pub fn upsert_node(&mut self, node: Node) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => {
                *existing = node;
                true
            }
            None => {
                self.nodes.push(node);
                false
            }
        }
    }

    pub fn upsert_edge(&mut self, edge: Edge) -> bool {
        match self.edges.iter_mut().find(|e| e.id == edge.id) {
            Some(existing) => {
                *existing = edge;
                true
            }
            None => {
                self.edges.push(edge);
                false
            }
        }
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let idx = self.nodes.iter().position(|n| n.id == id)?;
        self.edges.retain(|e| !e.touches(id));
        Some(self.nodes.remove(idx))
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let idx = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_wire_names() {
        let json = r#"{"id": 3, "label": "Ada", "type": "person",
            "attributes": {"notes": "mathematician"},
            "meta": {"created": 10, "updated": 20, "revision": 2}}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.node_type, "person");
        assert_eq!(node.degrees, 0);
        assert_eq!(node.meta.revision, 2);
        assert_eq!(node.attributes["notes"], "mathematician");

        let out = serde_json::to_value(&node).unwrap();
        assert!(out.get("filteredTransparency").is_none());
        assert!(out.get("bacon_value").is_none());
    }

    #[test]
    fn test_edge_defaults() {
        let edge: Edge = serde_json::from_str(r#"{"id": 1, "source": 1, "target": 2}"#).unwrap();
        assert_eq!(edge.size, 1.0);
        assert_eq!(edge.weight, None);
        assert!(edge.touches(2));
        assert!(!edge.touches(3));
    }

    #[test]
    fn test_remove_node_drops_touching_edges() {
        let mut data = NcData::new(
            vec![Node::new(1, "A"), Node::new(2, "B"), Node::new(3, "C")],
            vec![Edge::new(10, 1, 2), Edge::new(11, 2, 3), Edge::new(12, 3, 1)],
        );
        let removed = data.remove_node(1).unwrap();
        assert_eq!(removed.label, "A");
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.edges.iter().map(|e| e.id).collect::<Vec<_>>(), vec![11]);
        assert!(data.remove_node(1).is_none());
    }

    #[test]
    fn test_upsert_node_replaces_in_place() {
        let mut data = NcData::new(vec![Node::new(1, "A"), Node::new(2, "B")], vec![]);
        assert!(data.upsert_node(Node::new(1, "Alpha")));
        assert!(!data.upsert_node(Node::new(3, "C")));
        assert_eq!(data.nodes[0].label, "Alpha");
        assert_eq!(data.node_label(3), Some("C"));
    }
}
