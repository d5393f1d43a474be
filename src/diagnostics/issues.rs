use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which iterative solver raised an issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStage {
    RotationAveraging,
    PoseRefinement,
}

impl fmt::Display for SolverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStage::RotationAveraging => f.write_str("rotation averaging"),
            SolverStage::PoseRefinement => f.write_str("pose refinement"),
        }
    }
}

/// Recoverable conditions met while aggregating a floor.
///
/// None of these abort the floor; they are surfaced next to the estimate so
/// the caller can decide how to treat the affected nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Issue {
    /// A record failed validation and was dropped.
    MalformedHypothesis { source_index: usize, reason: String },
    LowConfidence {
        source_index: usize,
        confidence: f64,
        threshold: f64,
    },
    /// A same-pair, same-provenance record lost to `kept_source`.
    DuplicateHypothesis { source_index: usize, kept_source: usize },
    /// The floor splits into several components, each with its own frame.
    DisconnectedComponent {
        component: usize,
        size: usize,
        root: NodeId,
    },
    /// Rejecting `edge` would have disconnected its component; it is kept as Suspect.
    FilterDegenerate {
        edge: usize,
        node_i: NodeId,
        node_j: NodeId,
    },
    SolverNonconvergence {
        component: usize,
        stage: SolverStage,
        iterations: usize,
    },
    /// The component's nodes keep their spanning-tree poses.
    SingularSystem {
        component: usize,
        stage: SolverStage,
        nodes: Vec<NodeId>,
    },
    /// No valid edge on the floor; every pose is undefined.
    EmptyFloor,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MalformedHypothesis {
                source_index,
                reason,
            } => write!(f, "malformed hypothesis #{source_index}: {reason}"),
            Issue::LowConfidence {
                source_index,
                confidence,
                threshold,
            } => write!(
                f,
                "hypothesis #{source_index} below confidence threshold ({confidence:.3} < {threshold:.3})"
            ),
            Issue::DuplicateHypothesis {
                source_index,
                kept_source,
            } => write!(f, "hypothesis #{source_index} duplicates #{kept_source}"),
            Issue::DisconnectedComponent {
                component,
                size,
                root,
            } => write!(
                f,
                "component {component} ({size} nodes, root {root}) has its own frame"
            ),
            Issue::FilterDegenerate {
                edge,
                node_i,
                node_j,
            } => write!(
                f,
                "edge {edge} ({node_i} - {node_j}) kept as suspect to preserve connectivity"
            ),
            Issue::SolverNonconvergence {
                component,
                stage,
                iterations,
            } => write!(
                f,
                "{stage} did not converge on component {component} after {iterations} iterations"
            ),
            Issue::SingularSystem {
                component,
                stage,
                nodes,
            } => write!(
                f,
                "{stage} singular on component {component}, {} nodes unrefined",
                nodes.len()
            ),
            Issue::EmptyFloor => f.write_str("no valid edges on this floor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_serialize_with_kind_tag() {
        let issue = Issue::SolverNonconvergence {
            component: 2,
            stage: SolverStage::PoseRefinement,
            iterations: 100,
        };
        let json = serde_json::to_value(&issue).expect("serialize issue");
        assert_eq!(json["kind"], "solver_nonconvergence");
        assert_eq!(json["stage"], "pose_refinement");
        assert_eq!(json["iterations"], 100);

        let empty = serde_json::to_value(Issue::EmptyFloor).expect("serialize issue");
        assert_eq!(empty["kind"], "empty_floor");
    }

    #[test]
    fn display_names_the_component() {
        let issue = Issue::SingularSystem {
            component: 1,
            stage: SolverStage::PoseRefinement,
            nodes: vec![NodeId(4), NodeId(7)],
        };
        assert_eq!(
            issue.to_string(),
            "pose refinement singular on component 1, 2 nodes unrefined"
        );
    }
}
