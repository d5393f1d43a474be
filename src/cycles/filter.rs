//! Cycle consistency filter.
//!
//! Each enumerated cycle is checked against identity. Edges are then
//! rejected greedily, worst first:
//! 1. While some edge's outlier score (over cycles that do not contain an
//!    already rejected edge) exceeds the threshold, reject the worst one.
//! 2. Reject edges whose intact cycles are all inconsistent while every
//!    other edge of those cycles lies on a consistent cycle elsewhere,
//!    whatever their confidence, worst first.
//! 3. Reject remaining edges with no supporting consistent cycle whose
//!    confidence is below `min_unsupported_confidence`, lowest confidence
//!    first.
//!
//! A rejection that would split a connected part of the graph is turned
//! into a `Suspect` label instead; the edge stays in the graph and is not
//! reconsidered.
//!
//! Ties between equally scored candidates reject the lower-confidence edge;
//! on equal confidence the later-inserted edge is rejected, so the edge
//! discovered first is kept.

use super::enumerate::{enumerate_cycles, Cycle};
use crate::aggregate::params::CycleFilterOptions;
use crate::angle::wrap_to_pi;
use crate::graph::FloorGraph;
use crate::types::InlierLabel;
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Identity check of one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleCheck {
    pub rotation_residual: f64,
    pub translation_residual: f64,
    pub translation_threshold: f64,
    pub consistent: bool,
}

/// Cycle participation of one edge over all enumerated cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EdgeCycleStats {
    pub cycles: usize,
    pub consistent: usize,
    /// Outlier score over all enumerated cycles.
    pub score: f64,
}

/// Result of [`filter_edges`].
#[derive(Clone, Debug, Default)]
pub struct FilterOutcome {
    pub labels: Vec<InlierLabel>,
    pub stats: Vec<EdgeCycleStats>,
    pub cycles_checked: usize,
    pub inconsistent_cycles: usize,
    pub truncated: bool,
    /// Edges whose rejection was withheld to preserve connectivity, in decision order.
    pub demoted: Vec<usize>,
    /// Rejected edges, in decision order.
    pub rejected: Vec<usize>,
}

impl FilterOutcome {
    pub fn count(&self, label: InlierLabel) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}

/// Composes the cycle and compares it against identity.
pub fn check_cycle(graph: &FloorGraph, cycle: &Cycle, options: &CycleFilterOptions) -> CycleCheck {
    let composed = cycle.compose(graph);
    let rotation_residual = wrap_to_pi(composed.heading).abs();
    let translation_residual = composed.translation().norm();
    let translation_threshold =
        options.translation_error_threshold * cycle.scale(graph).max(options.min_cycle_scale);
    let consistent = rotation_residual <= options.rotation_error_threshold_deg.to_radians()
        && translation_residual <= translation_threshold;
    CycleCheck {
        rotation_residual,
        translation_residual,
        translation_threshold,
        consistent,
    }
}

fn outlier_score(cycles: usize, consistent: usize, prior: f64) -> f64 {
    if cycles == 0 {
        return 0.0;
    }
    (cycles - consistent) as f64 / (cycles as f64 + prior.max(0.0))
}

/// Labels every edge of the graph Inlier, Outlier or Suspect.
pub fn filter_edges(graph: &FloorGraph, options: &CycleFilterOptions) -> FilterOutcome {
    let m = graph.edge_count();
    let all = vec![true; m];
    let enumeration = enumerate_cycles(graph, &all, options.cycle_length(), options.max_cycles);
    let cycles = enumeration.cycles;
    let consistent: Vec<bool> = cycles
        .iter()
        .map(|c| check_cycle(graph, c, options).consistent)
        .collect();

    let mut cycles_of_edge: Vec<Vec<usize>> = vec![Vec::new(); m];
    for (idx, cycle) in cycles.iter().enumerate() {
        for &e in &cycle.edges {
            cycles_of_edge[e].push(idx);
        }
    }

    let stats: Vec<EdgeCycleStats> = cycles_of_edge
        .iter()
        .map(|members| {
            let good = members.iter().filter(|&&c| consistent[c]).count();
            EdgeCycleStats {
                cycles: members.len(),
                consistent: good,
                score: outlier_score(members.len(), good, options.significance_prior),
            }
        })
        .collect();

    let mut state = FilterState {
        graph,
        labels: vec![InlierLabel::Unknown; m],
        alive: all,
        cycle_active: vec![true; cycles.len()],
        cycles: &cycles,
        cycles_of_edge: &cycles_of_edge,
        demoted: Vec::new(),
        rejected: Vec::new(),
    };

    // Phase 1: score-driven rejection.
    loop {
        let mut best: Option<(usize, f64)> = None;
        for e in 0..m {
            if state.labels[e] != InlierLabel::Unknown {
                continue;
            }
            let (total, good) = state.active_counts(e, &consistent);
            let score = outlier_score(total, good, options.significance_prior);
            if score <= options.outlier_score_threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((b, bs)) => rejection_order(graph, e, score, b, bs) == Ordering::Less,
            };
            if better {
                best = Some((e, score));
            }
        }
        let Some((edge, score)) = best else { break };
        debug!(
            "floor {}: edge {} outlier score {:.3} above threshold",
            graph.floor_id, edge, score
        );
        state.reject_or_demote(edge);
    }

    // Phase 2: the odd edge out of inconsistent cycles.
    loop {
        let mut best: Option<(usize, f64)> = None;
        for e in 0..m {
            if state.labels[e] != InlierLabel::Unknown {
                continue;
            }
            let (total, good) = state.active_counts(e, &consistent);
            if total == 0 || good > 0 || !state.partners_supported(e, &consistent) {
                continue;
            }
            let score = outlier_score(total, good, options.significance_prior);
            let better = match best {
                None => true,
                Some((b, bs)) => rejection_order(graph, e, score, b, bs) == Ordering::Less,
            };
            if better {
                best = Some((e, score));
            }
        }
        let Some((edge, _)) = best else { break };
        debug!(
            "floor {}: edge {} is the only unsupported edge of its inconsistent cycles",
            graph.floor_id, edge
        );
        state.reject_or_demote(edge);
    }

    // Phase 3: unsupported low-confidence edges.
    let mut unsupported: Vec<usize> = (0..m)
        .filter(|&e| {
            state.labels[e] == InlierLabel::Unknown
                && graph.edge(e).confidence < options.min_unsupported_confidence
        })
        .collect();
    unsupported.sort_by(|&a, &b| {
        graph
            .edge(a)
            .confidence
            .total_cmp(&graph.edge(b).confidence)
            .then(b.cmp(&a))
    });
    for edge in unsupported {
        let (_, good) = state.active_counts(edge, &consistent);
        if good == 0 {
            state.reject_or_demote(edge);
        }
    }

    for label in state.labels.iter_mut() {
        if *label == InlierLabel::Unknown {
            *label = InlierLabel::Inlier;
        }
    }

    let inconsistent_cycles = consistent.iter().filter(|&&c| !c).count();
    debug!(
        "floor {}: {} cycles checked ({} inconsistent), {} edges rejected, {} demoted",
        graph.floor_id,
        cycles.len(),
        inconsistent_cycles,
        state.rejected.len(),
        state.demoted.len()
    );
    FilterOutcome {
        labels: state.labels,
        stats,
        cycles_checked: cycles.len(),
        inconsistent_cycles,
        truncated: enumeration.truncated,
        demoted: state.demoted,
        rejected: state.rejected,
    }
}

/// `Less` means `a` should be rejected before `b`.
fn rejection_order(graph: &FloorGraph, a: usize, score_a: f64, b: usize, score_b: f64) -> Ordering {
    score_b
        .total_cmp(&score_a)
        .then(graph.edge(a).confidence.total_cmp(&graph.edge(b).confidence))
        .then(b.cmp(&a))
}

struct FilterState<'a> {
    graph: &'a FloorGraph,
    labels: Vec<InlierLabel>,
    alive: Vec<bool>,
    cycle_active: Vec<bool>,
    cycles: &'a [Cycle],
    cycles_of_edge: &'a [Vec<usize>],
    demoted: Vec<usize>,
    rejected: Vec<usize>,
}

impl FilterState<'_> {
    /// (cycles, consistent cycles) of `edge` among cycles still intact.
    fn active_counts(&self, edge: usize, consistent: &[bool]) -> (usize, usize) {
        self.cycles_of_edge[edge]
            .iter()
            .filter(|&&c| self.cycle_active[c])
            .fold((0, 0), |(total, good), &c| {
                (total + 1, good + usize::from(consistent[c]))
            })
    }

    /// True when every other edge of the intact cycles through `edge` lies
    /// on at least one intact consistent cycle.
    fn partners_supported(&self, edge: usize, consistent: &[bool]) -> bool {
        self.cycles_of_edge[edge]
            .iter()
            .filter(|&&c| self.cycle_active[c])
            .flat_map(|&c| self.cycles[c].edges.iter())
            .filter(|&&other| other != edge)
            .all(|&other| self.active_counts(other, consistent).1 > 0)
    }

    fn reject_or_demote(&mut self, edge: usize) {
        if would_disconnect(self.graph, &self.alive, edge) {
            let e = self.graph.edge(edge);
            warn!(
                "floor {}: keeping edge {} ({} - {}) as suspect, rejecting it would disconnect the graph",
                self.graph.floor_id,
                edge,
                self.graph.node_id(e.i),
                self.graph.node_id(e.j)
            );
            self.labels[edge] = InlierLabel::Suspect;
            self.demoted.push(edge);
            return;
        }
        self.labels[edge] = InlierLabel::Outlier;
        self.alive[edge] = false;
        self.rejected.push(edge);
        for &c in &self.cycles_of_edge[edge] {
            self.cycle_active[c] = false;
        }
    }
}

/// True when removing `edge` leaves its endpoints without any path over the
/// remaining alive edges.
pub fn would_disconnect(graph: &FloorGraph, alive: &[bool], edge: usize) -> bool {
    let target = graph.edge(edge);
    let (src, dst) = (target.i, target.j);
    let mut visited = vec![false; graph.node_count()];
    let mut queue = VecDeque::from([src]);
    visited[src] = true;
    while let Some(node) = queue.pop_front() {
        if node == dst {
            return false;
        }
        for &e in graph.incident(node) {
            if e == edge || !alive[e] {
                continue;
            }
            let next = graph.edge(e).other(node);
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    true
}
