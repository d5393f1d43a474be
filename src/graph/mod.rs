//! Arena-backed floor graph built from scored pairwise hypotheses.
//!
//! Nodes and edges live in contiguous vectors and are referenced by dense
//! indices; adjacency is a per-node list of edge indices. Node order is the
//! order of first appearance (declared nodes first, then hypothesis
//! endpoints), edge order is the insertion order of accepted hypotheses.
//! Both orders are used as the final tie-break everywhere downstream, so a
//! fixed input sequence always yields the same output.
//!
//! Modules
//! - `builder` – validation, de-duplication and graph assembly.
//! - `components` – connected components over an edge subset.
//! - `union_find` – disjoint sets used by components and the spanning tree.

mod builder;
mod components;
mod error;
mod union_find;

pub use builder::{build_floor_graph, BuildOutcome, DroppedHypothesis, DropReason};
pub use components::{connected_components, Component};
pub use error::HypothesisError;
pub use union_find::UnionFind;

use crate::types::{InlierLabel, NodeId, Pose2, Provenance};
use std::collections::HashMap;

/// A panorama on the floor.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub ground_truth: Option<Pose2>,
}

/// A validated relative-pose hypothesis between two node indices.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    /// Index of the originating record in the floor's hypothesis list.
    pub source_index: usize,
    pub i: usize,
    pub j: usize,
    /// Pose of node `j` in the frame of node `i`.
    pub relative: Pose2,
    pub confidence: f64,
    pub provenance: Provenance,
    pub label: InlierLabel,
}

impl Edge {
    /// Returns the node on the other side of `from`.
    pub fn other(&self, from: usize) -> usize {
        if from == self.i {
            self.j
        } else {
            self.i
        }
    }

    /// Relative pose of the far node expressed in the frame of `from`.
    pub fn relative_from(&self, from: usize) -> Pose2 {
        if from == self.i {
            self.relative
        } else {
            self.relative.inverse()
        }
    }
}

/// Nodes and edges of a single floor.
#[derive(Clone, Debug, Default)]
pub struct FloorGraph {
    pub floor_id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<usize>>,
    index_of: HashMap<NodeId, usize>,
}

impl FloorGraph {
    pub fn new(floor_id: impl Into<String>) -> Self {
        Self {
            floor_id: floor_id.into(),
            ..Default::default()
        }
    }

    /// Returns the index of `id`, inserting the node if it is new.
    pub fn ensure_node(&mut self, id: NodeId) -> usize {
        if let Some(&idx) = self.index_of.get(&id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node {
            id,
            ground_truth: None,
        });
        self.adjacency.push(Vec::new());
        self.index_of.insert(id, idx);
        idx
    }

    pub fn set_ground_truth(&mut self, idx: usize, pose: Pose2) {
        self.nodes[idx].ground_truth = Some(pose);
    }

    pub fn push_edge(&mut self, edge: Edge) -> usize {
        debug_assert!(edge.i != edge.j, "self-loops are rejected by the builder");
        let idx = self.edges.len();
        self.adjacency[edge.i].push(idx);
        self.adjacency[edge.j].push(idx);
        self.edges.push(edge);
        idx
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge indices incident to node `idx`, in insertion order.
    pub fn incident(&self, idx: usize) -> &[usize] {
        &self.adjacency[idx]
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn node_id(&self, idx: usize) -> NodeId {
        self.nodes[idx].id
    }

    #[cfg(test)]
    pub(crate) fn edge_mut(&mut self, idx: usize) -> &mut Edge {
        &mut self.edges[idx]
    }

    pub fn set_label(&mut self, edge: usize, label: InlierLabel) {
        self.edges[edge].label = label;
    }

    /// Mask of edges that survived filtering (inliers and suspects).
    pub fn kept_mask(&self) -> Vec<bool> {
        self.edges.iter().map(|e| e.label.is_kept()).collect()
    }
}
