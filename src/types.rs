//! Core data model shared by every stage of the aggregation pipeline.
//!
//! Relative pose convention: a hypothesis `(i, j, relative)` states the pose
//! of panorama `j` expressed in the frame of panorama `i`, so that
//! `world_from_j = world_from_i.compose(&relative)`.

use crate::angle::{normalize_heading, wrap_to_pi};
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Panorama (or room) identifier, unique within a floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rigid 2D pose: position plus heading (radians).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose2 {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Default for Pose2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose2 {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.translation(), self.heading)
    }

    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self::new(
            iso.translation.vector.x,
            iso.translation.vector.y,
            wrap_to_pi(iso.rotation.angle()),
        )
    }

    /// `self ∘ other`: applies `other` in the frame of `self`.
    pub fn compose(&self, other: &Pose2) -> Pose2 {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    pub fn inverse(&self) -> Pose2 {
        Self::from_isometry(&self.to_isometry().inverse())
    }

    /// Pose of `other` expressed in the frame of `self`.
    pub fn between(&self, other: &Pose2) -> Pose2 {
        self.inverse().compose(other)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }

    /// Copy with the heading folded into [0, 2π) for reporting.
    pub fn normalized(&self) -> Pose2 {
        Pose2::new(self.x, self.y, normalize_heading(self.heading))
    }
}

/// Geometric cue that produced a hypothesis. Carried through, never interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Door,
    Window,
    Opening,
    LayoutOverlap,
    Other,
}

/// Classification assigned to every edge by the cycle consistency filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlierLabel {
    #[default]
    Unknown,
    Inlier,
    Outlier,
    /// Would have been rejected but is the only link keeping a component together.
    Suspect,
}

impl InlierLabel {
    /// Edges that survive filtering and feed the tree and solvers.
    pub fn is_kept(self) -> bool {
        !matches!(self, InlierLabel::Outlier)
    }
}

/// One externally generated, externally scored relative-pose hypothesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub floor_id: String,
    pub node_i: NodeId,
    pub node_j: NodeId,
    /// Heading of `j` relative to `i` (radians).
    pub rotation: f64,
    /// Position of `j` in the frame of `i`.
    pub translation: [f64; 2],
    pub confidence: f64,
    pub provenance: Provenance,
}

impl Hypothesis {
    pub fn relative_pose(&self) -> Pose2 {
        Pose2::new(
            self.translation[0],
            self.translation[1],
            wrap_to_pi(self.rotation),
        )
    }
}

/// Optional per-node declaration: lets callers list panoramas without any
/// valid hypothesis and attach ground truth for evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub floor_id: String,
    pub node_id: NodeId,
    #[serde(default)]
    pub ground_truth: Option<Pose2>,
}

/// All inputs for a single floor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorHypotheses {
    pub floor_id: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    pub hypotheses: Vec<Hypothesis>,
}

impl FloorHypotheses {
    pub fn new(floor_id: impl Into<String>, hypotheses: Vec<Hypothesis>) -> Self {
        Self {
            floor_id: floor_id.into(),
            nodes: Vec::new(),
            hypotheses,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeSpec>) -> Self {
        self.nodes = nodes;
        self
    }
}

/// Groups raw hypotheses by floor in a reproducible order.
///
/// Hypotheses are sorted by (floor, smaller node, larger node, provenance)
/// so that parallel producers hand the core a deterministic sequence; the
/// sort is stable, so equal keys keep their arrival order. Floors are
/// returned in lexical order of their id.
pub fn group_by_floor(mut hypotheses: Vec<Hypothesis>, nodes: Vec<NodeSpec>) -> Vec<FloorHypotheses> {
    hypotheses.sort_by(|a, b| {
        let ka = (a.node_i.min(a.node_j), a.node_i.max(a.node_j));
        let kb = (b.node_i.min(b.node_j), b.node_i.max(b.node_j));
        a.floor_id
            .cmp(&b.floor_id)
            .then(ka.cmp(&kb))
            .then(a.provenance.cmp(&b.provenance))
    });

    let mut floors: std::collections::BTreeMap<String, FloorHypotheses> =
        std::collections::BTreeMap::new();
    for hyp in hypotheses {
        floors
            .entry(hyp.floor_id.clone())
            .or_insert_with(|| FloorHypotheses::new(hyp.floor_id.clone(), Vec::new()))
            .hypotheses
            .push(hyp);
    }
    for node in nodes {
        floors
            .entry(node.floor_id.clone())
            .or_insert_with(|| FloorHypotheses::new(node.floor_id.clone(), Vec::new()))
            .nodes
            .push(node);
    }
    floors.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: &Pose2, b: &Pose2) -> bool {
        (a.x - b.x).abs() < 1e-9
            && (a.y - b.y).abs() < 1e-9
            && crate::angle::angular_difference(a.heading, b.heading) < 1e-9
    }

    #[test]
    fn compose_then_between_recovers_relative() {
        let a = Pose2::new(1.0, 2.0, 0.3);
        let rel = Pose2::new(-0.5, 0.75, -1.2);
        let b = a.compose(&rel);
        assert!(close(&a.between(&b), &rel));
    }

    #[test]
    fn inverse_cancels() {
        let a = Pose2::new(3.0, -1.0, 2.5);
        assert!(close(&a.compose(&a.inverse()), &Pose2::identity()));
        assert!(close(&a.inverse().compose(&a), &Pose2::identity()));
    }

    #[test]
    fn compose_rotates_translation() {
        let a = Pose2::new(0.0, 0.0, FRAC_PI_2);
        let step = Pose2::new(1.0, 0.0, 0.0);
        assert!(close(&a.compose(&step), &Pose2::new(0.0, 1.0, FRAC_PI_2)));
    }

    #[test]
    fn composed_heading_stays_in_signed_range() {
        let a = Pose2::new(1.0, 0.0, 3.0);
        let b = a.compose(&Pose2::new(0.0, 0.0, 0.5));
        assert!((b.heading - (3.5 - std::f64::consts::TAU)).abs() < 1e-12);
        assert!(a.inverse().heading > -std::f64::consts::PI);
    }

    #[test]
    fn isometry_roundtrip_matches() {
        let a = Pose2::new(0.4, -2.0, -2.9);
        assert!(close(&Pose2::from_isometry(&a.to_isometry()), &a));
    }

    #[test]
    fn group_by_floor_sorts_and_splits() {
        let mk = |floor: &str, i: u32, j: u32, provenance: Provenance| Hypothesis {
            floor_id: floor.to_string(),
            node_i: NodeId(i),
            node_j: NodeId(j),
            rotation: 0.0,
            translation: [1.0, 0.0],
            confidence: 1.0,
            provenance,
        };
        let floors = group_by_floor(
            vec![
                mk("f2", 3, 1, Provenance::Door),
                mk("f1", 2, 0, Provenance::Window),
                mk("f1", 0, 1, Provenance::Door),
                mk("f1", 2, 0, Provenance::Door),
            ],
            vec![NodeSpec {
                floor_id: "f3".to_string(),
                node_id: NodeId(7),
                ground_truth: None,
            }],
        );
        assert_eq!(floors.len(), 3);
        assert_eq!(floors[0].floor_id, "f1");
        let keys: Vec<_> = floors[0]
            .hypotheses
            .iter()
            .map(|h| (h.node_i.0, h.node_j.0, h.provenance))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0, 1, Provenance::Door),
                (2, 0, Provenance::Door),
                (2, 0, Provenance::Window)
            ]
        );
        assert!(floors[2].hypotheses.is_empty());
        assert_eq!(floors[2].nodes.len(), 1);
    }
}
