//! Per-floor orchestration of the aggregation stages.
//!
//! [`PoseAggregator`] runs, for one floor:
//! 1. graph building (validation, confidence pre-filter, de-duplication),
//! 2. the cycle consistency filter,
//! 3. the maximum-confidence spanning forest,
//! 4. per component: robust rotation averaging, then pose-graph refinement,
//! 5. diagnostics and, when ground truth is present, evaluation.
//!
//! Components never exchange information; each one is solved in its own
//! frame with its root at the anchor pose (identity unless re-fixed).
//! Nothing is kept between calls, so floors can be processed in any order or
//! in parallel.
//!
//! Typical usage:
//! ```no_run
//! use floorplan_aggregator::{AggregatorParams, FloorHypotheses, PoseAggregator};
//!
//! # fn example(floor: FloorHypotheses) {
//! let aggregator = PoseAggregator::new(AggregatorParams::default());
//! let estimate = aggregator.aggregate(&floor);
//! for (id, node) in &estimate.poses {
//!     println!("{id}: {:?} refined={}", node.pose, node.refined);
//! }
//! # }
//! ```

mod estimate;
pub mod params;

pub use estimate::FloorEstimate;
pub use params::{
    AggregatorParams, CycleFilterOptions, EvaluationOptions, GraphOptions, RefinerOptions,
    RotationAveragingOptions,
};

use crate::angle::wrap_to_pi;
use crate::cycles::{filter_edges, FilterOutcome};
use crate::diagnostics::{
    ComponentReport, CycleSummary, EdgeReport, FloorDiagnostics, Issue, LabelCounts,
    NodeEstimate, ResidualSummary, SolverStage, TimingBreakdown,
};
use crate::evaluation::evaluate_floor;
use crate::graph::{build_floor_graph, DropReason, FloorGraph};
use crate::posegraph::{edge_residual, refine_component};
use crate::rotation::average_rotations;
use crate::solver::{SolverReport, SolverState};
use crate::tree::{build_spanning_forest, ComponentTree, SpanningForest};
use crate::types::{FloorHypotheses, InlierLabel, NodeId, Pose2};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

/// Stateless floor aggregator configured once with [`AggregatorParams`].
#[derive(Clone, Debug, Default)]
pub struct PoseAggregator {
    params: AggregatorParams,
    anchor: Pose2,
}

struct ComponentSolution {
    report: ComponentReport,
    /// `(node, pose, refined)` for every node of the component.
    poses: Vec<(usize, Pose2, bool)>,
    rotation_ms: f64,
    refine_ms: f64,
}

impl PoseAggregator {
    pub fn new(params: AggregatorParams) -> Self {
        Self {
            params,
            anchor: Pose2::identity(),
        }
    }

    /// Fixes every component root at `anchor` instead of the identity.
    pub fn with_root_anchor(mut self, anchor: Pose2) -> Self {
        self.anchor = anchor;
        self
    }

    /// Aggregates several floors in parallel; output order follows input order.
    pub fn aggregate_floors(&self, floors: &[FloorHypotheses]) -> Vec<FloorEstimate> {
        floors.par_iter().map(|floor| self.aggregate(floor)).collect()
    }

    /// Aggregates the hypotheses of one floor into absolute poses.
    pub fn aggregate(&self, floor: &FloorHypotheses) -> FloorEstimate {
        let t_total = Instant::now();
        let mut timing = TimingBreakdown::default();
        let mut issues = Vec::new();

        let mut t = Instant::now();
        let built = build_floor_graph(floor, &self.params.graph);
        let mut graph = built.graph;
        for dropped in built.dropped {
            issues.push(match dropped.reason {
                DropReason::Malformed(err) => Issue::MalformedHypothesis {
                    source_index: dropped.source_index,
                    reason: err.to_string(),
                },
                DropReason::LowConfidence {
                    confidence,
                    threshold,
                } => Issue::LowConfidence {
                    source_index: dropped.source_index,
                    confidence,
                    threshold,
                },
                DropReason::Duplicate { kept_source } => Issue::DuplicateHypothesis {
                    source_index: dropped.source_index,
                    kept_source,
                },
            });
        }
        if graph.edge_count() == 0 {
            warn!("floor {}: no valid edges, poses are undefined", floor.floor_id);
            issues.push(Issue::EmptyFloor);
        }
        t = timing.lap("graph", t);

        let filter = filter_edges(&graph, &self.params.cycles);
        for (edge, &label) in filter.labels.iter().enumerate() {
            graph.set_label(edge, label);
        }
        for &edge in &filter.demoted {
            let e = graph.edge(edge);
            issues.push(Issue::FilterDegenerate {
                edge,
                node_i: graph.node_id(e.i),
                node_j: graph.node_id(e.j),
            });
        }
        t = timing.lap("cycle_filter", t);

        let forest = build_spanning_forest(&graph, &graph.kept_mask());
        let tree_mask = forest.tree_edge_mask(graph.edge_count());
        if graph.edge_count() > 0 && forest.trees.len() > 1 {
            for tree in &forest.trees {
                issues.push(Issue::DisconnectedComponent {
                    component: tree.component_id,
                    size: tree.len(),
                    root: graph.node_id(tree.root),
                });
            }
        }
        timing.lap("spanning_tree", t);

        let mut poses: Vec<Option<Pose2>> = vec![None; graph.node_count()];
        let mut refined = vec![false; graph.node_count()];
        let mut components = Vec::with_capacity(forest.trees.len());
        let (mut rotation_ms, mut refine_ms) = (0.0, 0.0);
        for tree in &forest.trees {
            let solution = self.solve_component(&graph, &forest, tree, &mut issues);
            for &(node, pose, was_refined) in &solution.poses {
                poses[node] = Some(pose);
                refined[node] = was_refined;
            }
            rotation_ms += solution.rotation_ms;
            refine_ms += solution.refine_ms;
            components.push(solution.report);
        }
        timing.push("rotation_averaging", rotation_ms);
        timing.push("pose_refinement", refine_ms);

        let t = Instant::now();
        let edges = edge_reports(&graph, &filter, &tree_mask, &poses, &forest.component_of);
        let kept_norms: Vec<f64> = edges
            .iter()
            .filter(|r| r.label.is_kept())
            .filter_map(|r| r.residual.map(|res| res.norm))
            .collect();
        let evaluation = evaluate_floor(
            &graph,
            &poses,
            &forest.component_of,
            &self.params.evaluation,
        );
        if evaluation.is_some() {
            timing.lap("evaluation", t);
        }

        let converged = components.iter().all(|c| c.converged);
        let node_estimates: BTreeMap<NodeId, NodeEstimate> = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                (
                    node.id,
                    NodeEstimate {
                        pose: poses[idx].map(|p| p.normalized()),
                        refined: refined[idx],
                        component: forest.component_of[idx],
                    },
                )
            })
            .collect();

        timing.total_ms = t_total.elapsed().as_secs_f64() * 1000.0;
        let labels = LabelCounts::from_labels(&filter.labels);
        debug!(
            "floor {}: {} nodes, {} components, labels {}/{}/{} (inlier/suspect/outlier), converged={} in {:.2} ms",
            floor.floor_id,
            graph.node_count(),
            components.len(),
            labels.inlier,
            labels.suspect,
            labels.outlier,
            converged,
            timing.total_ms
        );

        FloorEstimate {
            floor_id: floor.floor_id.clone(),
            poses: node_estimates,
            diagnostics: FloorDiagnostics {
                hypotheses: floor.hypotheses.len(),
                edges,
                components,
                labels,
                residuals: ResidualSummary::from_values(&kept_norms),
                cycles: CycleSummary {
                    cycles_checked: filter.cycles_checked,
                    inconsistent_cycles: filter.inconsistent_cycles,
                    truncated: filter.truncated,
                },
                issues,
                timing,
                converged,
            },
            evaluation,
        }
    }

    fn solve_component(
        &self,
        graph: &FloorGraph,
        forest: &SpanningForest,
        tree: &ComponentTree,
        issues: &mut Vec<Issue>,
    ) -> ComponentSolution {
        let node_ids: Vec<NodeId> = tree.nodes.iter().map(|&n| graph.node_id(n)).collect();
        let mut report = ComponentReport {
            component: tree.component_id,
            root: graph.node_id(tree.root),
            size: tree.len(),
            nodes: node_ids.clone(),
            edges: tree.edges.len(),
            tree_edges: tree.tree_edges.len(),
            rotation: SolverReport::trivial(),
            refinement: SolverReport::trivial(),
            converged: true,
            refined: false,
        };
        if tree.is_singleton() {
            // No edge constrains an isolated node: its pose stays undefined.
            return ComponentSolution {
                report,
                poses: Vec::new(),
                rotation_ms: 0.0,
                refine_ms: 0.0,
            };
        }

        let t = Instant::now();
        let mut headings: Vec<f64> = forest
            .initial_poses
            .iter()
            .map(|p| p.map_or(0.0, |p| p.heading))
            .collect();
        let rotations = average_rotations(
            graph,
            tree,
            &headings,
            self.anchor.heading,
            &self.params.rotation,
        );
        match rotations.report.state {
            SolverState::Singular => {
                issues.push(Issue::SingularSystem {
                    component: tree.component_id,
                    stage: SolverStage::RotationAveraging,
                    nodes: node_ids,
                });
                // Tree headings, re-anchored.
                let offset = self.anchor.heading - headings[tree.root];
                for &node in &tree.nodes {
                    headings[node] = wrap_to_pi(headings[node] + offset);
                }
            }
            SolverState::MaxIterExceeded => {
                issues.push(Issue::SolverNonconvergence {
                    component: tree.component_id,
                    stage: SolverStage::RotationAveraging,
                    iterations: rotations.report.iterations,
                });
                rotations.scatter(&mut headings);
            }
            _ => rotations.scatter(&mut headings),
        }
        let rotation_ms = t.elapsed().as_secs_f64() * 1000.0;

        let t = Instant::now();
        let seed = tree.propagate(graph, self.anchor, Some(&headings));
        let refinement = refine_component(graph, tree, &seed, &headings, &self.params.refine);
        match refinement.report.state {
            SolverState::Singular => issues.push(Issue::SingularSystem {
                component: tree.component_id,
                stage: SolverStage::PoseRefinement,
                nodes: refinement
                    .nodes
                    .iter()
                    .zip(&refinement.refined)
                    .filter(|(_, &refined)| !refined)
                    .map(|(&node, _)| graph.node_id(node))
                    .collect(),
            }),
            SolverState::MaxIterExceeded => issues.push(Issue::SolverNonconvergence {
                component: tree.component_id,
                stage: SolverStage::PoseRefinement,
                iterations: refinement.report.iterations,
            }),
            _ => {}
        }
        let refine_ms = t.elapsed().as_secs_f64() * 1000.0;

        report.rotation = rotations.report;
        report.refinement = refinement.report;
        report.converged = rotations.report.converged() && refinement.report.converged();
        report.refined = refinement.refined.iter().all(|&r| r);
        let poses = refinement
            .nodes
            .iter()
            .zip(&refinement.poses)
            .zip(&refinement.refined)
            .map(|((&node, &pose), &refined)| (node, pose, refined))
            .collect();
        ComponentSolution {
            report,
            poses,
            rotation_ms,
            refine_ms,
        }
    }
}

fn edge_reports(
    graph: &FloorGraph,
    filter: &FilterOutcome,
    tree_mask: &[bool],
    poses: &[Option<Pose2>],
    component_of: &[usize],
) -> Vec<EdgeReport> {
    graph
        .edges()
        .iter()
        .enumerate()
        .map(|(idx, e)| {
            let residual = match (poses[e.i], poses[e.j]) {
                (Some(xi), Some(xj)) if component_of[e.i] == component_of[e.j] => {
                    Some(edge_residual(graph, idx, &xi, &xj))
                }
                _ => None,
            };
            let stats = filter.stats.get(idx).copied().unwrap_or_default();
            EdgeReport {
                edge: idx,
                source_index: e.source_index,
                node_i: graph.node_id(e.i),
                node_j: graph.node_id(e.j),
                provenance: e.provenance,
                confidence: e.confidence,
                label: filter.labels.get(idx).copied().unwrap_or(InlierLabel::Unknown),
                in_tree: tree_mask[idx],
                cycles: stats.cycles,
                consistent_cycles: stats.consistent,
                outlier_score: stats.score,
                residual,
            }
        })
        .collect()
}

/// Aggregates one floor with the given parameters.
pub fn aggregate(floor: &FloorHypotheses, params: &AggregatorParams) -> FloorEstimate {
    PoseAggregator::new(params.clone()).aggregate(floor)
}

/// Aggregates several floors in parallel; output order follows input order.
pub fn aggregate_floors(floors: &[FloorHypotheses], params: &AggregatorParams) -> Vec<FloorEstimate> {
    PoseAggregator::new(params.clone()).aggregate_floors(floors)
}
