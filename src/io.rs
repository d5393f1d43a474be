//! JSON helpers at the tool boundary: hypothesis input and report output.

use crate::types::{Hypothesis, NodeSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum HypothesisFile {
    List(Vec<Hypothesis>),
    Document {
        hypotheses: Vec<Hypothesis>,
        #[serde(default)]
        nodes: Vec<NodeSpec>,
    },
}

/// Parses hypotheses (and optional node declarations) from JSON text.
pub fn parse_hypotheses(json: &str) -> Result<(Vec<Hypothesis>, Vec<NodeSpec>), String> {
    let file: HypothesisFile =
        serde_json::from_str(json).map_err(|e| format!("Failed to parse hypotheses: {e}"))?;
    Ok(match file {
        HypothesisFile::List(hypotheses) => (hypotheses, Vec::new()),
        HypothesisFile::Document { hypotheses, nodes } => (hypotheses, nodes),
    })
}

pub fn read_hypotheses(path: &Path) -> Result<(Vec<Hypothesis>, Vec<NodeSpec>), String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hypotheses {}: {e}", path.display()))?;
    parse_hypotheses(&contents).map_err(|e| format!("{}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeId, Provenance};

    const RECORD: &str = r#"{
        "floor_id": "floor_01",
        "node_i": 3,
        "node_j": 7,
        "rotation": 1.5707963267948966,
        "translation": [2.0, -0.5],
        "confidence": 0.93,
        "provenance": "door"
    }"#;

    #[test]
    fn accepts_a_plain_list() {
        let (hyps, nodes) = parse_hypotheses(&format!("[{RECORD}]")).expect("list parses");
        assert_eq!(hyps.len(), 1);
        assert!(nodes.is_empty());
        assert_eq!(hyps[0].node_j, NodeId(7));
        assert_eq!(hyps[0].provenance, Provenance::Door);
    }

    #[test]
    fn accepts_a_document_with_nodes() {
        let json = format!(
            r#"{{
                "hypotheses": [{RECORD}],
                "nodes": [
                    {{ "floor_id": "floor_01", "node_id": 3,
                       "ground_truth": {{ "x": 0.0, "y": 1.0, "heading": 0.5 }} }},
                    {{ "floor_id": "floor_01", "node_id": 9 }}
                ]
            }}"#
        );
        let (hyps, nodes) = parse_hypotheses(&json).expect("document parses");
        assert_eq!(hyps.len(), 1);
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].ground_truth.is_some());
        assert!(nodes[1].ground_truth.is_none());
    }

    #[test]
    fn garbage_is_reported() {
        assert!(parse_hypotheses("{ \"nope\": 1 }").is_err());
    }
}
