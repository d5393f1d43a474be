//! Synthetic floors shared by the unit tests.

use crate::graph::{Edge, FloorGraph};
use crate::types::{Hypothesis, InlierLabel, NodeId, Pose2, Provenance};

pub const FLOOR: &str = "floor_test";

/// Exact relative pose of `j` in the frame of `i`.
pub fn relative(truth: &[Pose2], i: usize, j: usize) -> Pose2 {
    truth[i].between(&truth[j])
}

pub fn hypothesis(i: u32, j: u32, rel: Pose2, confidence: f64) -> Hypothesis {
    Hypothesis {
        floor_id: FLOOR.to_string(),
        node_i: NodeId(i),
        node_j: NodeId(j),
        rotation: rel.heading,
        translation: [rel.x, rel.y],
        confidence,
        provenance: Provenance::LayoutOverlap,
    }
}

/// Graph with node `k` holding id `k` and one edge per pair, measured
/// exactly from `truth`.
pub fn graph_from_truth(truth: &[Pose2], pairs: &[(usize, usize)]) -> FloorGraph {
    let mut graph = FloorGraph::new(FLOOR);
    for k in 0..truth.len() {
        graph.ensure_node(NodeId(k as u32));
    }
    for (source_index, &(i, j)) in pairs.iter().enumerate() {
        graph.push_edge(Edge {
            source_index,
            i,
            j,
            relative: relative(truth, i, j),
            confidence: 1.0,
            provenance: Provenance::LayoutOverlap,
            label: InlierLabel::Inlier,
        });
    }
    graph
}

pub fn set_relative(graph: &mut FloorGraph, edge: usize, relative: Pose2) {
    graph.edge_mut(edge).relative = relative;
}

pub fn set_confidence(graph: &mut FloorGraph, edge: usize, confidence: f64) {
    graph.edge_mut(edge).confidence = confidence;
}

/// Five panoramas laid out like a small apartment.
pub fn apartment_truth() -> Vec<Pose2> {
    vec![
        Pose2::new(0.0, 0.0, 0.0),
        Pose2::new(4.0, 0.5, 0.4),
        Pose2::new(4.5, 3.5, 1.9),
        Pose2::new(0.5, 4.0, -2.6),
        Pose2::new(2.0, 2.0, 3.0),
    ]
}

/// Dense pairs over the apartment: every triangle is present.
pub fn apartment_pairs() -> Vec<(usize, usize)> {
    vec![
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (0, 4),
        (1, 4),
        (2, 4),
        (3, 4),
        (0, 2),
    ]
}

pub fn assert_pose_close(a: &Pose2, b: &Pose2, tol: f64) {
    assert!(
        (a.x - b.x).abs() < tol
            && (a.y - b.y).abs() < tol
            && crate::angle::angular_difference(a.heading, b.heading) < tol,
        "poses differ: {a:?} vs {b:?}"
    );
}
