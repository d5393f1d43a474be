//! Pose-graph refinement of one connected component.
//!
//! Minimizes
//!
//! ```text
//! F(x) = Σ_e c_e ρ(‖e(xi, xj, z)‖²_Ω) + λ_p Σ_n wrap(θn − θ̄n)² / σr²
//! ```
//!
//! over every kept edge of the component, where `e = between(xi, xj) − z`
//! (heading wrapped), `Ω = diag(1/σt², 1/σt², 1/σr²)`, `c_e` is the edge
//! confidence and `ρ` an optional Huber kernel on the whitened norm. The
//! second term ties the headings to the rotation-averaging result `θ̄`.
//!
//! The root pose is removed from the unknowns (gauge fixing). The solver is
//! Levenberg–Marquardt on the dense normal equations. A component whose
//! undamped system is not positive definite at the seed is reported as
//! `Singular`; its nodes outside the block constrained from the root keep
//! their seed poses.

mod residual;

pub use residual::{edge_residual, EdgeResidual};

use crate::aggregate::params::RefinerOptions;
use crate::angle::wrap_to_pi;
use crate::graph::{FloorGraph, UnionFind};
use crate::solver::{huber_loss, huber_weight, SolverReport, SolverState};
use crate::tree::ComponentTree;
use crate::types::Pose2;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3};
use residual::{edge_error, edge_jacobians};

const MAX_DAMPING: f64 = 1e12;
const MIN_DAMPING: f64 = 1e-12;

/// Refined poses of one component.
#[derive(Clone, Debug)]
pub struct Refinement {
    /// Component nodes (same order as `ComponentTree::nodes`).
    pub nodes: Vec<usize>,
    pub poses: Vec<Pose2>,
    /// Per node: `false` when the node kept its seed pose after a singular solve.
    pub refined: Vec<bool>,
    /// Residual per kept component edge, evaluated at `poses`.
    pub residuals: Vec<EdgeResidual>,
    pub report: SolverReport,
}

struct Problem<'a> {
    graph: &'a FloorGraph,
    /// Node index -> slot in the component.
    local: &'a [usize],
    prior: &'a [f64],
    edges: Vec<usize>,
    var_of: Vec<Option<usize>>,
    info: Matrix3<f64>,
    prior_weight: f64,
    huber_delta: Option<f64>,
}

impl<'a> Problem<'a> {
    /// Problem over the component slots with `block` set; the root is fixed
    /// and only edges with both ends in the block take part.
    fn new(
        graph: &'a FloorGraph,
        tree: &ComponentTree,
        local: &'a [usize],
        prior: &'a [f64],
        block: &[bool],
        options: &RefinerOptions,
    ) -> Self {
        let mut var_of = vec![None; tree.nodes.len()];
        let mut nvars = 0usize;
        for (slot, &node) in tree.nodes.iter().enumerate() {
            if block[slot] && node != tree.root {
                var_of[slot] = Some(nvars);
                nvars += 1;
            }
        }
        let edges = tree
            .edges
            .iter()
            .copied()
            .filter(|&edge| {
                let e = graph.edge(edge);
                block[local[e.i]] && block[local[e.j]]
            })
            .collect();
        let wt = 1.0 / (options.translation_sigma * options.translation_sigma);
        let sigma_r = options.rotation_sigma_deg.to_radians();
        let wr = 1.0 / (sigma_r * sigma_r);
        Self {
            graph,
            local,
            prior,
            edges,
            var_of,
            info: Matrix3::from_diagonal(&nalgebra::Vector3::new(wt, wt, wr)),
            prior_weight: options.heading_prior_weight.max(0.0) * wr,
            huber_delta: options.huber_delta.filter(|d| *d > 0.0),
        }
    }

    fn dim(&self) -> usize {
        3 * self.var_of.iter().flatten().count()
    }

    fn robust(&self, error: &nalgebra::Vector3<f64>) -> (f64, f64) {
        let s2 = error.dot(&(self.info * error));
        match self.huber_delta {
            Some(delta) => {
                let s = s2.sqrt();
                (2.0 * huber_loss(s, delta), huber_weight(s, delta))
            }
            None => (s2, 1.0),
        }
    }

    fn cost(&self, poses: &[Pose2]) -> f64 {
        let mut cost = 0.0;
        for &edge in &self.edges {
            let e = self.graph.edge(edge);
            let (xi, xj) = (&poses[self.local[e.i]], &poses[self.local[e.j]]);
            let (loss, _) = self.robust(&edge_error(xi, xj, &e.relative));
            cost += e.confidence * loss;
        }
        for (slot, var) in self.var_of.iter().enumerate() {
            if var.is_some() {
                let r = wrap_to_pi(poses[slot].heading - self.prior[slot]);
                cost += self.prior_weight * r * r;
            }
        }
        cost
    }

    fn normal_equations(&self, poses: &[Pose2], dim: usize) -> (DMatrix<f64>, DVector<f64>) {
        let mut h = DMatrix::<f64>::zeros(dim, dim);
        let mut b = DVector::<f64>::zeros(dim);
        for &edge in &self.edges {
            let e = self.graph.edge(edge);
            let (si, sj) = (self.local[e.i], self.local[e.j]);
            let (xi, xj) = (&poses[si], &poses[sj]);
            let error = edge_error(xi, xj, &e.relative);
            let (_, w) = self.robust(&error);
            let omega = self.info * (e.confidence * w);
            let (ji, jj) = edge_jacobians(xi, xj);

            let vi = self.var_of[si].map(|v| 3 * v);
            let vj = self.var_of[sj].map(|v| 3 * v);
            if let Some(a) = vi {
                let mut hii = h.fixed_view_mut::<3, 3>(a, a);
                hii += ji.transpose() * omega * ji;
                let mut bi = b.fixed_rows_mut::<3>(a);
                bi += ji.transpose() * omega * error;
            }
            if let Some(c) = vj {
                let mut hjj = h.fixed_view_mut::<3, 3>(c, c);
                hjj += jj.transpose() * omega * jj;
                let mut bj = b.fixed_rows_mut::<3>(c);
                bj += jj.transpose() * omega * error;
            }
            if let (Some(a), Some(c)) = (vi, vj) {
                let hij = ji.transpose() * omega * jj;
                let mut upper = h.fixed_view_mut::<3, 3>(a, c);
                upper += hij;
                let mut lower = h.fixed_view_mut::<3, 3>(c, a);
                lower += hij.transpose();
            }
        }
        for (slot, var) in self.var_of.iter().enumerate() {
            if let Some(v) = var {
                let k = 3 * v + 2;
                let r = wrap_to_pi(poses[slot].heading - self.prior[slot]);
                h[(k, k)] += self.prior_weight;
                b[k] += self.prior_weight * r;
            }
        }
        (h, b)
    }

    fn apply(&self, poses: &[Pose2], step: &DVector<f64>) -> (Vec<Pose2>, f64) {
        let mut max_step = 0.0f64;
        let next = poses
            .iter()
            .zip(&self.var_of)
            .map(|(pose, var)| match var {
                Some(v) => {
                    let d = step.fixed_rows::<3>(3 * v);
                    max_step = max_step.max(d.amax());
                    Pose2::new(pose.x + d[0], pose.y + d[1], wrap_to_pi(pose.heading + d[2]))
                }
                None => *pose,
            })
            .collect();
        (next, max_step)
    }
}

/// Refines the poses of one component.
///
/// `seed` holds one pose per component node (the output of
/// [`ComponentTree::propagate`]); the root's seed pose is the fixed anchor.
/// `headings` is indexed by node and carries the averaged headings used as
/// the heading prior.
///
/// When the full system is singular, the nodes tied to the root through
/// edges of positive confidence are refined on their own and only the
/// remaining nodes keep their seed poses.
pub fn refine_component(
    graph: &FloorGraph,
    tree: &ComponentTree,
    seed: &[(usize, Pose2)],
    headings: &[f64],
    options: &RefinerOptions,
) -> Refinement {
    let n = tree.nodes.len();
    let mut local = vec![usize::MAX; graph.node_count()];
    for (slot, &node) in tree.nodes.iter().enumerate() {
        local[node] = slot;
    }
    let mut poses = vec![Pose2::identity(); n];
    for &(node, pose) in seed {
        poses[local[node]] = pose;
    }
    let prior: Vec<f64> = tree.nodes.iter().map(|&node| headings[node]).collect();

    let full = Problem::new(graph, tree, &local, &prior, &vec![true; n], options);
    let seed_poses = poses.clone();
    let mut report = SolverReport::start(full.cost(&poses));
    let mut refined = vec![true; n];
    let state = levenberg_marquardt(&full, &mut poses, options, &mut report);
    if state == SolverState::Singular {
        poses = seed_poses.clone();
        refined = constrained_block(graph, tree, &local);
        let size = refined.iter().filter(|&&r| r).count();
        let block_state = if size > 1 && size < n {
            let block = Problem::new(graph, tree, &local, &prior, &refined, options);
            levenberg_marquardt(&block, &mut poses, options, &mut report)
        } else {
            SolverState::Singular
        };
        if block_state == SolverState::Singular {
            poses = seed_poses;
            refined = vec![false; n];
        }
    }
    report.final_cost = full.cost(&poses);
    let report = report.finish(state);
    let kept = refined.iter().filter(|&&r| !r).count();

    match report.state {
        SolverState::Converged => debug!(
            "floor {}: component {} refined in {} iterations (cost {:.3e} -> {:.3e})",
            graph.floor_id, tree.component_id, report.iterations, report.initial_cost, report.final_cost
        ),
        SolverState::Singular => warn!(
            "floor {}: component {} pose graph is singular, keeping tree poses for {} of {} nodes",
            graph.floor_id, tree.component_id, kept, n
        ),
        _ => warn!(
            "floor {}: component {} refinement hit the iteration cap ({}), cost {:.3e}",
            graph.floor_id, tree.component_id, report.iterations, report.final_cost
        ),
    }

    let residuals = tree
        .edges
        .iter()
        .map(|&edge| {
            let e = graph.edge(edge);
            edge_residual(graph, edge, &poses[local[e.i]], &poses[local[e.j]])
        })
        .collect();

    Refinement {
        nodes: tree.nodes.clone(),
        poses,
        refined,
        residuals,
        report,
    }
}

/// Component slots linked to the root by edges of positive confidence.
fn constrained_block(graph: &FloorGraph, tree: &ComponentTree, local: &[usize]) -> Vec<bool> {
    let mut uf = UnionFind::new(graph.node_count());
    for &edge in &tree.edges {
        let e = graph.edge(edge);
        if e.confidence > 0.0 {
            uf.union(e.i, e.j);
        }
    }
    let mut block = vec![false; tree.nodes.len()];
    for &node in &tree.nodes {
        block[local[node]] = uf.connected(node, tree.root);
    }
    block
}

fn levenberg_marquardt(
    problem: &Problem<'_>,
    poses: &mut Vec<Pose2>,
    options: &RefinerOptions,
    report: &mut SolverReport,
) -> SolverState {
    let dim = problem.dim();
    if dim == 0 {
        return SolverState::Converged;
    }
    let (h0, _) = problem.normal_equations(poses, dim);
    if h0.cholesky().is_none() {
        return SolverState::Singular;
    }

    let mut cost = problem.cost(poses);
    if cost <= f64::EPSILON * f64::EPSILON {
        return SolverState::Converged;
    }
    let mut lambda = options.initial_damping.max(MIN_DAMPING);
    let mut state = SolverState::Iterating;
    while !state.is_terminal() {
        if report.iterations >= options.max_iterations {
            state = SolverState::MaxIterExceeded;
            break;
        }
        report.iterations += 1;

        let (mut h, b) = problem.normal_equations(poses, dim);
        for k in 0..dim {
            h[(k, k)] += lambda * h[(k, k)].max(1e-9);
        }
        let Some(chol) = h.cholesky() else {
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                state = SolverState::Singular;
            }
            continue;
        };
        let step = chol.solve(&(-b));
        let (candidate, max_step) = problem.apply(poses, &step);
        if !max_step.is_finite() {
            state = SolverState::Singular;
            break;
        }
        let new_cost = problem.cost(&candidate);

        if new_cost <= cost {
            let decrease = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);
            *poses = candidate;
            cost = new_cost;
            report.last_step = max_step;
            lambda = (lambda * 0.1).max(MIN_DAMPING);
            if decrease < options.cost_tolerance || max_step < options.step_tolerance {
                state = SolverState::Converged;
            }
        } else if max_step < options.step_tolerance {
            // Rounding noise around the minimum.
            state = SolverState::Converged;
        } else {
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                // No descent direction left.
                state = SolverState::Converged;
            }
        }
    }
    state
}
