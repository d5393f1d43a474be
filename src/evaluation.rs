//! Ground-truth evaluation of a floor estimate.
//!
//! Only runs when at least one node carries a ground-truth pose.
//!
//! - Edge classification: an edge whose endpoints both have ground truth is
//!   a true inlier when its relative pose agrees with the ground-truth
//!   relative pose within the configured tolerances. Kept edges (inlier or
//!   suspect) are the predicted positives.
//! - Pose accuracy: every component's estimate lives in its own frame, so
//!   each component is rigidly aligned to ground truth (least squares on the
//!   positions, the single pose when only one node has ground truth) before
//!   position and heading errors are measured.

use crate::aggregate::params::EvaluationOptions;
use crate::angle::{angular_difference, wrap_to_pi};
use crate::diagnostics::ResidualSummary;
use crate::graph::FloorGraph;
use crate::types::Pose2;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EPS: f64 = 1e-7;

/// Confusion counts and derived rates, positive class = inlier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    /// Mean of the per-class accuracies (row-normalized confusion diagonal).
    pub mean_accuracy: f64,
}

/// Classification metrics for paired ground-truth / predicted labels.
pub fn classification_metrics(truth: &[bool], predicted: &[bool]) -> ClassificationMetrics {
    let mut m = ClassificationMetrics::default();
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t, p) {
            (true, true) => m.true_positives += 1,
            (false, true) => m.false_positives += 1,
            (true, false) => m.false_negatives += 1,
            (false, false) => m.true_negatives += 1,
        }
    }
    let (tp, fp, fn_, tn) = (
        m.true_positives as f64,
        m.false_positives as f64,
        m.false_negatives as f64,
        m.true_negatives as f64,
    );
    m.precision = tp / (tp + fp + EPS);
    m.recall = tp / (tp + fn_ + EPS);
    m.mean_accuracy = 0.5 * (tp / (tp + fn_ + EPS) + tn / (fp + tn + EPS));
    m
}

/// Rigid transform `T` minimizing `Σ |T(est_k) - gt_k|²` over positions.
///
/// With a single pair the full pose is used, so the heading is aligned too.
pub fn align_rigid(estimates: &[Pose2], truth: &[Pose2]) -> Option<Pose2> {
    let n = estimates.len().min(truth.len());
    match n {
        0 => None,
        1 => Some(truth[0].compose(&estimates[0].inverse())),
        _ => {
            let inv_n = 1.0 / n as f64;
            let ce = estimates[..n]
                .iter()
                .fold(Vector2::zeros(), |acc, p| acc + p.translation())
                * inv_n;
            let cg = truth[..n]
                .iter()
                .fold(Vector2::zeros(), |acc, p| acc + p.translation())
                * inv_n;
            let (mut dot, mut cross) = (0.0, 0.0);
            for (e, g) in estimates[..n].iter().zip(&truth[..n]) {
                let a = e.translation() - ce;
                let b = g.translation() - cg;
                dot += a.dot(&b);
                cross += a.x * b.y - a.y * b.x;
            }
            let angle = if dot.abs() + cross.abs() <= f64::EPSILON {
                // All positions coincide: fall back to the mean heading offset.
                circular_mean(
                    estimates[..n]
                        .iter()
                        .zip(&truth[..n])
                        .map(|(e, g)| wrap_to_pi(g.heading - e.heading)),
                )
            } else {
                cross.atan2(dot)
            };
            let rotated = nalgebra::Rotation2::new(angle) * ce;
            let t = cg - rotated;
            Some(Pose2::new(t.x, t.y, angle))
        }
    }
}

fn circular_mean(angles: impl Iterator<Item = f64>) -> f64 {
    let (s, c) = angles.fold((0.0, 0.0), |(s, c), a| (s + a.sin(), c + a.cos()));
    s.atan2(c)
}

/// Ground-truth evaluation of one floor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorEvaluation {
    /// Absent when no edge has ground truth at both endpoints.
    pub classification: Option<ClassificationMetrics>,
    pub evaluated_nodes: usize,
    pub components_aligned: usize,
    pub position_error: ResidualSummary,
    pub heading_error_deg: ResidualSummary,
}

/// Evaluates labels and poses against the ground truth attached to `graph`.
///
/// `poses` and `component_of` are indexed by node.
pub fn evaluate_floor(
    graph: &FloorGraph,
    poses: &[Option<Pose2>],
    component_of: &[usize],
    options: &EvaluationOptions,
) -> Option<FloorEvaluation> {
    let nodes = graph.nodes();
    if nodes.iter().all(|n| n.ground_truth.is_none()) {
        return None;
    }

    let rot_tol = options.rotation_tolerance_deg.to_radians();
    let mut truth_labels = Vec::new();
    let mut predicted = Vec::new();
    for edge in graph.edges() {
        let (Some(gi), Some(gj)) = (nodes[edge.i].ground_truth, nodes[edge.j].ground_truth) else {
            continue;
        };
        let expected = gi.between(&gj);
        let rot_err = angular_difference(expected.heading, edge.relative.heading);
        let trans_err = (expected.translation() - edge.relative.translation()).norm();
        truth_labels.push(rot_err <= rot_tol && trans_err <= options.translation_tolerance);
        predicted.push(edge.label.is_kept());
    }
    let classification =
        (!truth_labels.is_empty()).then(|| classification_metrics(&truth_labels, &predicted));

    let mut groups: BTreeMap<usize, (Vec<Pose2>, Vec<Pose2>)> = BTreeMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let (Some(est), Some(gt)) = (poses[idx], node.ground_truth) {
            let entry = groups.entry(component_of[idx]).or_default();
            entry.0.push(est);
            entry.1.push(gt);
        }
    }

    let mut position_errors = Vec::new();
    let mut heading_errors = Vec::new();
    let mut components_aligned = 0;
    for (estimates, truth) in groups.values() {
        let Some(align) = align_rigid(estimates, truth) else {
            continue;
        };
        components_aligned += 1;
        for (est, gt) in estimates.iter().zip(truth) {
            let mapped = align.compose(est);
            position_errors.push((mapped.translation() - gt.translation()).norm());
            heading_errors.push(angular_difference(mapped.heading, gt.heading).to_degrees());
        }
    }

    Some(FloorEvaluation {
        classification,
        evaluated_nodes: position_errors.len(),
        components_aligned,
        position_error: ResidualSummary::from_values(&position_errors),
        heading_error_deg: ResidualSummary::from_values(&heading_errors),
    })
}
