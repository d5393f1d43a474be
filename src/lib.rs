#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod aggregate;
pub mod diagnostics;
pub mod evaluation;
pub mod types;

// Stage modules: public for tools and tests, considered internals.
pub mod angle;
pub mod cycles;
pub mod graph;
pub mod posegraph;
pub mod rotation;
pub mod solver;
pub mod tree;

// Tool boundary.
pub mod config;
pub mod io;

#[cfg(test)]
mod test_support;

// --- High-level re-exports -------------------------------------------------

// Main entry points: aggregator + results.
pub use crate::aggregate::{aggregate, aggregate_floors, AggregatorParams, FloorEstimate, PoseAggregator};
pub use crate::types::{
    group_by_floor, FloorHypotheses, Hypothesis, InlierLabel, NodeId, NodeSpec, Pose2, Provenance,
};

// Diagnostics returned with every estimate.
pub use crate::diagnostics::{FloorDiagnostics, Issue, NodeEstimate};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use floorplan_aggregator::prelude::*;
///
/// # fn main() {
/// let hyps = vec![Hypothesis {
///     floor_id: "floor_01".into(),
///     node_i: NodeId(0),
///     node_j: NodeId(1),
///     rotation: 0.0,
///     translation: [1.0, 0.0],
///     confidence: 0.9,
///     provenance: Provenance::Door,
/// }];
/// let floor = FloorHypotheses::new("floor_01", hyps);
/// let estimate = PoseAggregator::new(AggregatorParams::default()).aggregate(&floor);
/// println!("converged={} poses={}", estimate.converged(), estimate.poses.len());
/// # }
/// ```
pub mod prelude {
    pub use crate::types::{FloorHypotheses, Hypothesis, NodeId, Pose2, Provenance};
    pub use crate::{AggregatorParams, FloorEstimate, PoseAggregator};
}

// --- Stage-level API (for tools & advanced users) --------------------------

pub mod stages {
    // Stage runners.
    pub use crate::cycles::{enumerate_cycles, filter_edges};
    pub use crate::graph::build_floor_graph;
    pub use crate::posegraph::refine_component;
    pub use crate::rotation::average_rotations;
    pub use crate::tree::build_spanning_forest;

    // Stage outputs.
    pub use crate::cycles::{Cycle, CycleEnumeration, FilterOutcome};
    pub use crate::graph::{BuildOutcome, FloorGraph};
    pub use crate::posegraph::{EdgeResidual, Refinement};
    pub use crate::rotation::RotationAveraging;
    pub use crate::solver::{SolverReport, SolverState};
    pub use crate::tree::{ComponentTree, SpanningForest};

    // Structured diagnostics types.
    pub use crate::diagnostics::{
        ComponentReport, CycleSummary, EdgeReport, LabelCounts, ResidualSummary, SolverStage,
        StageTiming, TimingBreakdown,
    };
}
