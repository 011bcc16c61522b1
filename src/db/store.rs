//! JSON file persistence for graph snapshots.
//!
//! The live graph is owned by the server; these files are what the CLI and
//! offline sessions read and write (`{"nodes": [...], "edges": [...]}`).

use std::fs;
use std::path::Path;

use super::models::NcData;
use crate::error::Result;

pub fn load_ncdata(path: &Path) -> Result<NcData> {
    let content = fs::read_to_string(path)?;
    let data: NcData = serde_json::from_str(&content)?;
    tracing::debug!(
        "loaded {} nodes, {} edges from {}",
        data.nodes.len(),
        data.edges.len(),
        path.display()
    );
    Ok(data)
}

pub fn save_ncdata(data: &NcData, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(data)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Edge, Node};

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");
        let data = NcData::new(vec![Node::new(1, "A"), Node::new(2, "B")], vec![Edge::new(5, 1, 2)]);

        save_ncdata(&data, &path).unwrap();
        let loaded = load_ncdata(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_ncdata(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
