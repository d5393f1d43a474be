use crate::diagnostics::{FloorDiagnostics, NodeEstimate};
use crate::evaluation::FloorEvaluation;
use crate::types::{NodeId, Pose2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Global pose estimate of one floor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorEstimate {
    pub floor_id: String,
    pub poses: BTreeMap<NodeId, NodeEstimate>,
    pub diagnostics: FloorDiagnostics,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evaluation: Option<FloorEvaluation>,
}

impl FloorEstimate {
    pub fn pose(&self, id: NodeId) -> Option<Pose2> {
        self.poses.get(&id).and_then(|n| n.pose)
    }

    pub fn converged(&self) -> bool {
        self.diagnostics.converged
    }

    /// Nodes whose pose did not go through refinement.
    pub fn unrefined(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.poses
            .iter()
            .filter(|(_, n)| n.pose.is_some() && !n.refined)
            .map(|(id, _)| *id)
    }

    /// Multi-line human readable summary.
    pub fn summary(&self) -> String {
        let d = &self.diagnostics;
        let mut out = String::new();
        let posed = self.poses.values().filter(|n| n.pose.is_some()).count();
        let _ = writeln!(
            out,
            "floor {}: {} nodes ({} posed), {} components, converged={}",
            self.floor_id,
            self.poses.len(),
            posed,
            d.components.len(),
            d.converged
        );
        let _ = writeln!(
            out,
            "  edges: {} inlier, {} suspect, {} outlier ({} cycles checked, {} inconsistent)",
            d.labels.inlier,
            d.labels.suspect,
            d.labels.outlier,
            d.cycles.cycles_checked,
            d.cycles.inconsistent_cycles
        );
        let _ = writeln!(
            out,
            "  residuals: mean {:.4} median {:.4} max {:.4} over {} edges",
            d.residuals.mean, d.residuals.median, d.residuals.max, d.residuals.count
        );
        if let Some(eval) = &self.evaluation {
            if let Some(cls) = &eval.classification {
                let _ = writeln!(
                    out,
                    "  classification: precision {:.3} recall {:.3} mAcc {:.3}",
                    cls.precision, cls.recall, cls.mean_accuracy
                );
            }
            let _ = writeln!(
                out,
                "  pose error: position mean {:.3} max {:.3}, heading mean {:.2} deg max {:.2} deg",
                eval.position_error.mean,
                eval.position_error.max,
                eval.heading_error_deg.mean,
                eval.heading_error_deg.max
            );
        }
        for issue in &d.issues {
            let _ = writeln!(out, "  ! {issue}");
        }
        let _ = write!(
            out,
            "  rotation {:.2} ms, refinement {:.2} ms, total {:.2} ms",
            d.timing.stage_ms("rotation_averaging").unwrap_or(0.0),
            d.timing.stage_ms("pose_refinement").unwrap_or(0.0),
            d.timing.total_ms
        );
        out
    }
}
