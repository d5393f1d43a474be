//! Robust rotation averaging over one connected component.
//!
//! Unknowns are the absolute headings of every non-root node; the root is
//! held at the supplied heading. Each kept edge `(i, j)` with observed
//! heading change `φ` contributes the residual
//! `r = wrap(θj − θi − φ)`, which is linear in the unknowns up to wrapping.
//! The solver runs IRLS: per iteration it weights each residual by
//! `confidence * huber(r)`, solves the weighted normal equations
//! (a reduced graph Laplacian) by Cholesky and applies the update, until the
//! largest update falls below the tolerance or the iteration cap is hit.

use crate::aggregate::params::RotationAveragingOptions;
use crate::angle::wrap_to_pi;
use crate::graph::FloorGraph;
use crate::solver::{huber_loss, huber_weight, SolverReport, SolverState};
use crate::tree::ComponentTree;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

/// Averaged headings of one component.
#[derive(Clone, Debug)]
pub struct RotationAveraging {
    /// Component nodes (same order as `ComponentTree::nodes`).
    pub nodes: Vec<usize>,
    /// Heading per entry of `nodes`, wrapped to (-π, π].
    pub headings: Vec<f64>,
    /// Final angular residual per kept component edge.
    pub residuals: Vec<(usize, f64)>,
    pub report: SolverReport,
}

impl RotationAveraging {
    /// Writes the headings into a node-indexed buffer.
    pub fn scatter(&self, out: &mut [f64]) {
        for (&node, &heading) in self.nodes.iter().zip(&self.headings) {
            out[node] = heading;
        }
    }
}

struct Problem<'a> {
    graph: &'a FloorGraph,
    edges: &'a [usize],
    /// Local slot per global node (usize::MAX outside the component).
    local: Vec<usize>,
    /// Variable index per local slot (None for the root).
    var_of: Vec<Option<usize>>,
    delta: f64,
}

impl Problem<'_> {
    fn residual(&self, theta: &[f64], edge: usize) -> (usize, usize, f64) {
        let e = self.graph.edge(edge);
        let (li, lj) = (self.local[e.i], self.local[e.j]);
        let r = wrap_to_pi(theta[lj] - theta[li] - e.relative.heading);
        (li, lj, r)
    }

    fn cost(&self, theta: &[f64]) -> f64 {
        self.edges
            .iter()
            .map(|&edge| {
                let (_, _, r) = self.residual(theta, edge);
                self.graph.edge(edge).confidence * huber_loss(r, self.delta)
            })
            .sum()
    }

    fn normal_equations(&self, theta: &[f64], nvars: usize) -> (DMatrix<f64>, DVector<f64>) {
        let mut h = DMatrix::<f64>::zeros(nvars, nvars);
        let mut b = DVector::<f64>::zeros(nvars);
        for &edge in self.edges {
            let (li, lj, r) = self.residual(theta, edge);
            let w = self.graph.edge(edge).confidence * huber_weight(r, self.delta);
            let (vi, vj) = (self.var_of[li], self.var_of[lj]);
            // d r / d θi = -1, d r / d θj = +1
            if let Some(a) = vi {
                h[(a, a)] += w;
                b[a] -= w * r;
            }
            if let Some(c) = vj {
                h[(c, c)] += w;
                b[c] += w * r;
            }
            if let (Some(a), Some(c)) = (vi, vj) {
                h[(a, c)] -= w;
                h[(c, a)] -= w;
            }
        }
        (h, b)
    }
}

/// Averages the headings of one component.
///
/// `initial` is indexed by global node and seeds the iteration (typically
/// the tree-propagated headings); it is re-anchored so the root starts at
/// `root_heading`, which stays fixed.
pub fn average_rotations(
    graph: &FloorGraph,
    tree: &ComponentTree,
    initial: &[f64],
    root_heading: f64,
    options: &RotationAveragingOptions,
) -> RotationAveraging {
    let mut local = vec![usize::MAX; graph.node_count()];
    for (slot, &node) in tree.nodes.iter().enumerate() {
        local[node] = slot;
    }
    let mut var_of = vec![None; tree.nodes.len()];
    let mut nvars = 0usize;
    for (slot, &node) in tree.nodes.iter().enumerate() {
        if node != tree.root {
            var_of[slot] = Some(nvars);
            nvars += 1;
        }
    }

    let offset = root_heading - initial[tree.root];
    let mut theta: Vec<f64> = tree
        .nodes
        .iter()
        .map(|&node| wrap_to_pi(initial[node] + offset))
        .collect();
    theta[local[tree.root]] = wrap_to_pi(root_heading);

    let problem = Problem {
        graph,
        edges: &tree.edges,
        local,
        var_of,
        delta: options.huber_delta_deg.to_radians(),
    };

    let tolerance = options.tolerance_deg.to_radians();
    let mut report = SolverReport::start(problem.cost(&theta));
    let final_state = if nvars == 0 {
        SolverState::Converged
    } else {
        iterate(&problem, &mut theta, nvars, options.max_iterations, tolerance, &mut report)
    };
    report.final_cost = problem.cost(&theta);
    let report = report.finish(final_state);

    match report.state {
        SolverState::Converged => debug!(
            "floor {}: component {} rotations converged in {} iterations (cost {:.3e} -> {:.3e})",
            graph.floor_id, tree.component_id, report.iterations, report.initial_cost, report.final_cost
        ),
        SolverState::Singular => warn!(
            "floor {}: component {} rotation normal equations are singular",
            graph.floor_id, tree.component_id
        ),
        _ => warn!(
            "floor {}: component {} rotation averaging hit the iteration cap ({}), last step {:.3e} rad",
            graph.floor_id, tree.component_id, report.iterations, report.last_step
        ),
    }

    let residuals = tree
        .edges
        .iter()
        .map(|&edge| (edge, problem.residual(&theta, edge).2))
        .collect();
    for heading in theta.iter_mut() {
        *heading = wrap_to_pi(*heading);
    }
    RotationAveraging {
        nodes: tree.nodes.clone(),
        headings: theta,
        residuals,
        report,
    }
}

fn iterate(
    problem: &Problem<'_>,
    theta: &mut [f64],
    nvars: usize,
    max_iterations: usize,
    tolerance: f64,
    report: &mut SolverReport,
) -> SolverState {
    let mut state = SolverState::Iterating;
    while !state.is_terminal() {
        if report.iterations >= max_iterations {
            state = SolverState::MaxIterExceeded;
            break;
        }
        report.iterations += 1;
        let (h, b) = problem.normal_equations(theta, nvars);
        let Some(chol) = h.cholesky() else {
            state = SolverState::Singular;
            break;
        };
        let step = chol.solve(&(-b));
        let mut max_step = 0.0f64;
        for (slot, var) in problem.var_of.iter().enumerate() {
            if let Some(v) = *var {
                theta[slot] += step[v];
                max_step = max_step.max(step[v].abs());
            }
        }
        report.last_step = max_step;
        if !max_step.is_finite() {
            state = SolverState::Singular;
        } else if max_step < tolerance {
            state = SolverState::Converged;
        }
    }
    state
}
