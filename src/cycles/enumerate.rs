//! Bounded enumeration of simple cycles in the (multi)graph.
//!
//! Every cycle is reported once: it starts at its smallest node index, only
//! visits larger indices, and of its two traversal directions only the one
//! whose second node is smaller than its last node is kept. Parallel edges
//! between the same pair make distinct cycles.

use crate::graph::FloorGraph;
use crate::types::Pose2;
use log::warn;

/// A closed walk `nodes[0] -> nodes[1] -> ... -> nodes[0]`; `edges[k]` links
/// `nodes[k]` to `nodes[(k + 1) % len]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub nodes: Vec<usize>,
    pub edges: Vec<usize>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Composition of the relative poses walking the cycle; identity when the
    /// measurements agree.
    pub fn compose(&self, graph: &FloorGraph) -> Pose2 {
        self.nodes
            .iter()
            .zip(&self.edges)
            .fold(Pose2::identity(), |acc, (&from, &edge)| {
                acc.compose(&graph.edge(edge).relative_from(from))
            })
    }

    /// Mean translation length of the member edges, used to scale the
    /// translation threshold to room size.
    pub fn scale(&self, graph: &FloorGraph) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .edges
            .iter()
            .map(|&e| graph.edge(e).relative.translation().norm())
            .sum();
        total / self.edges.len() as f64
    }
}

/// Result of [`enumerate_cycles`].
#[derive(Clone, Debug, Default)]
pub struct CycleEnumeration {
    pub cycles: Vec<Cycle>,
    /// True when `max_cycles` cut the enumeration short.
    pub truncated: bool,
}

struct Enumerator<'a> {
    graph: &'a FloorGraph,
    mask: &'a [bool],
    max_len: usize,
    max_cycles: usize,
    start: usize,
    on_path: Vec<bool>,
    path_nodes: Vec<usize>,
    path_edges: Vec<usize>,
    out: Vec<Cycle>,
    truncated: bool,
}

impl<'a> Enumerator<'a> {
    fn walk(&mut self, node: usize) {
        let graph = self.graph;
        for &edge in graph.incident(node) {
            if self.truncated {
                return;
            }
            if !self.mask[edge] || self.path_edges.contains(&edge) {
                continue;
            }
            let next = graph.edge(edge).other(node);
            if next == self.start {
                self.close(edge);
                continue;
            }
            if next < self.start || self.on_path[next] || self.path_nodes.len() >= self.max_len {
                continue;
            }
            self.on_path[next] = true;
            self.path_nodes.push(next);
            self.path_edges.push(edge);
            self.walk(next);
            self.path_edges.pop();
            self.path_nodes.pop();
            self.on_path[next] = false;
        }
    }

    fn close(&mut self, edge: usize) {
        let len = self.path_nodes.len();
        if len < 3 || self.path_nodes[1] > self.path_nodes[len - 1] {
            return;
        }
        if self.out.len() >= self.max_cycles {
            self.truncated = true;
            return;
        }
        let mut edges = self.path_edges.clone();
        edges.push(edge);
        self.out.push(Cycle {
            nodes: self.path_nodes.clone(),
            edges,
        });
    }
}

/// Enumerates simple cycles of length `3..=max_len` using edges whose mask
/// entry is true, stopping after `max_cycles` cycles.
pub fn enumerate_cycles(
    graph: &FloorGraph,
    mask: &[bool],
    max_len: usize,
    max_cycles: usize,
) -> CycleEnumeration {
    let n = graph.node_count();
    let mut enumerator = Enumerator {
        graph,
        mask,
        max_len: max_len.max(3),
        max_cycles,
        start: 0,
        on_path: vec![false; n],
        path_nodes: Vec::with_capacity(max_len),
        path_edges: Vec::with_capacity(max_len),
        out: Vec::new(),
        truncated: false,
    };
    for start in 0..n {
        if enumerator.truncated {
            break;
        }
        enumerator.start = start;
        enumerator.on_path[start] = true;
        enumerator.path_nodes.push(start);
        enumerator.walk(start);
        enumerator.path_nodes.pop();
        enumerator.on_path[start] = false;
    }
    if enumerator.truncated {
        warn!(
            "floor {}: cycle enumeration truncated at {} cycles",
            graph.floor_id, max_cycles
        );
    }
    CycleEnumeration {
        cycles: enumerator.out,
        truncated: enumerator.truncated,
    }
}
