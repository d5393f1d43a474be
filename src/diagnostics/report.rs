use super::{Issue, TimingBreakdown};
use crate::posegraph::EdgeResidual;
use crate::solver::SolverReport;
use crate::types::{InlierLabel, NodeId, Pose2, Provenance};
use serde::{Deserialize, Serialize};

/// Final estimate of one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEstimate {
    /// Pose in the frame of the node's component, heading in [0, 2π).
    /// `None` when the node has no surviving edge.
    pub pose: Option<Pose2>,
    /// `false` when the pose comes from the spanning tree only.
    pub refined: bool,
    pub component: usize,
}

/// Per-edge outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeReport {
    pub edge: usize,
    pub source_index: usize,
    pub node_i: NodeId,
    pub node_j: NodeId,
    pub provenance: Provenance,
    pub confidence: f64,
    pub label: InlierLabel,
    pub in_tree: bool,
    pub cycles: usize,
    pub consistent_cycles: usize,
    pub outlier_score: f64,
    /// Evaluated at the final poses; `None` when an endpoint has no pose.
    pub residual: Option<EdgeResidual>,
}

/// Per-component outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReport {
    pub component: usize,
    pub root: NodeId,
    pub size: usize,
    pub nodes: Vec<NodeId>,
    pub edges: usize,
    pub tree_edges: usize,
    pub rotation: SolverReport,
    pub refinement: SolverReport,
    /// Both solvers reached their tolerance.
    pub converged: bool,
    /// Every node carries a refined pose.
    pub refined: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCounts {
    pub inlier: usize,
    pub outlier: usize,
    pub suspect: usize,
    pub unknown: usize,
}

impl LabelCounts {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a InlierLabel>) -> Self {
        let mut counts = Self::default();
        for label in labels {
            match label {
                InlierLabel::Inlier => counts.inlier += 1,
                InlierLabel::Outlier => counts.outlier += 1,
                InlierLabel::Suspect => counts.suspect += 1,
                InlierLabel::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.inlier + self.outlier + self.suspect + self.unknown
    }
}

/// Summary statistics of a set of residual norms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
}

impl ResidualSummary {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
        };
        Self {
            count: n,
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
            max: sorted[n - 1],
        }
    }
}

/// Cycle filter statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub cycles_checked: usize,
    pub inconsistent_cycles: usize,
    /// Enumeration stopped at the cycle cap.
    pub truncated: bool,
}

/// Everything reported about one floor besides the poses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorDiagnostics {
    pub hypotheses: usize,
    pub edges: Vec<EdgeReport>,
    pub components: Vec<ComponentReport>,
    pub labels: LabelCounts,
    /// Residual norms over inlier and suspect edges.
    pub residuals: ResidualSummary,
    pub cycles: CycleSummary,
    pub issues: Vec<Issue>,
    pub timing: TimingBreakdown,
    /// Every component converged in both solvers.
    pub converged: bool,
}

impl FloorDiagnostics {
    pub fn edge(&self, edge: usize) -> Option<&EdgeReport> {
        self.edges.get(edge)
    }

    pub fn has_issue(&self, pred: impl Fn(&Issue) -> bool) -> bool {
        self.issues.iter().any(pred)
    }
}
