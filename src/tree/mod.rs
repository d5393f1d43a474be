//! Maximum-confidence spanning forest over the filtered graph.
//!
//! Kruskal with edges sorted by confidence descending (ties: smaller
//! `(min node id, max node id)` pair first, then insertion order) and a
//! union-find cycle guard. Per connected component the node with the largest
//! total incident confidence becomes the root (ties: smallest node id); its
//! pose is the gauge of the component's local frame. Initial poses are
//! obtained by composing relative poses along tree paths from the root.

use crate::graph::{connected_components, FloorGraph, UnionFind};
use crate::types::Pose2;
use log::debug;
use std::collections::VecDeque;

/// Spanning tree of one connected component.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentTree {
    pub component_id: usize,
    pub root: usize,
    /// Node indices, ascending.
    pub nodes: Vec<usize>,
    /// All kept edges inside the component, ascending.
    pub edges: Vec<usize>,
    /// The `nodes.len() - 1` tree edges, in the order Kruskal accepted them.
    pub tree_edges: Vec<usize>,
    /// Nodes in breadth-first order from the root, with the tree edge that
    /// reached them (`None` for the root).
    pub order: Vec<(usize, Option<usize>)>,
}

impl ComponentTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Composes poses from `root_pose` along the tree. When `headings` is
    /// given (indexed by node), those headings replace the composed ones and
    /// only translations are propagated.
    pub fn propagate(
        &self,
        graph: &FloorGraph,
        root_pose: Pose2,
        headings: Option<&[f64]>,
    ) -> Vec<(usize, Pose2)> {
        let mut poses: Vec<(usize, Pose2)> = Vec::with_capacity(self.order.len());
        // Breadth-first order: a parent is always placed before its children.
        let mut placed: Vec<Pose2> = vec![root_pose; graph.node_count()];
        for &(node, via) in &self.order {
            let pose = match via {
                None => match headings {
                    Some(h) => Pose2::new(root_pose.x, root_pose.y, h[node]),
                    None => root_pose,
                },
                Some(edge) => {
                    let e = graph.edge(edge);
                    let parent = e.other(node);
                    let composed = placed[parent].compose(&e.relative_from(parent));
                    match headings {
                        Some(h) => Pose2::new(composed.x, composed.y, h[node]),
                        None => composed,
                    }
                }
            };
            placed[node] = pose;
            poses.push((node, pose));
        }
        poses
    }
}

/// Spanning trees of every component plus the tree-propagated seed poses.
#[derive(Clone, Debug, Default)]
pub struct SpanningForest {
    pub trees: Vec<ComponentTree>,
    /// Component index per node.
    pub component_of: Vec<usize>,
    /// Seed pose per node; `None` for nodes without any kept edge.
    pub initial_poses: Vec<Option<Pose2>>,
}

impl SpanningForest {
    pub fn tree_edge_mask(&self, edge_count: usize) -> Vec<bool> {
        let mut mask = vec![false; edge_count];
        for tree in &self.trees {
            for &e in &tree.tree_edges {
                mask[e] = true;
            }
        }
        mask
    }
}

/// Builds the maximum-confidence spanning forest over edges with `mask` set.
pub fn build_spanning_forest(graph: &FloorGraph, mask: &[bool]) -> SpanningForest {
    let n = graph.node_count();
    let mut candidates: Vec<usize> = (0..graph.edge_count()).filter(|&e| mask[e]).collect();
    candidates.sort_by(|&a, &b| {
        let (ea, eb) = (graph.edge(a), graph.edge(b));
        eb.confidence
            .total_cmp(&ea.confidence)
            .then(pair_key(graph, a).cmp(&pair_key(graph, b)))
            .then(a.cmp(&b))
    });

    let mut uf = UnionFind::new(n);
    let mut accepted = Vec::with_capacity(n.saturating_sub(1));
    for e in candidates {
        let edge = graph.edge(e);
        if uf.union(edge.i, edge.j) {
            accepted.push(e);
        }
    }

    let components = connected_components(graph, mask);
    let mut component_of = vec![0usize; n];
    for (cid, comp) in components.iter().enumerate() {
        for &node in &comp.nodes {
            component_of[node] = cid;
        }
    }

    let mut incident_confidence = vec![0.0f64; n];
    for (e, edge) in graph.edges().iter().enumerate() {
        if mask[e] {
            incident_confidence[edge.i] += edge.confidence;
            incident_confidence[edge.j] += edge.confidence;
        }
    }

    let mut tree_adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &e in &accepted {
        let edge = graph.edge(e);
        tree_adjacency[edge.i].push(e);
        tree_adjacency[edge.j].push(e);
    }

    let mut initial_poses = vec![None; n];
    let mut trees = Vec::with_capacity(components.len());
    for (cid, comp) in components.into_iter().enumerate() {
        let root = comp
            .nodes
            .iter()
            .copied()
            .max_by(|&a, &b| {
                incident_confidence[a]
                    .total_cmp(&incident_confidence[b])
                    .then(graph.node_id(b).cmp(&graph.node_id(a)))
            })
            .unwrap_or(0);
        let tree_edges: Vec<usize> = accepted
            .iter()
            .copied()
            .filter(|&e| component_of[graph.edge(e).i] == cid)
            .collect();
        let order = bfs_order(graph, &tree_adjacency, root);
        debug_assert_eq!(order.len(), comp.nodes.len());
        debug_assert_eq!(tree_edges.len() + 1, comp.nodes.len());

        let tree = ComponentTree {
            component_id: cid,
            root,
            nodes: comp.nodes,
            edges: comp.edges,
            tree_edges,
            order,
        };
        if !tree.is_singleton() {
            for (node, pose) in tree.propagate(graph, Pose2::identity(), None) {
                initial_poses[node] = Some(pose);
            }
        }
        trees.push(tree);
    }

    debug!(
        "floor {}: spanning forest with {} components, {} tree edges",
        graph.floor_id,
        trees.len(),
        accepted.len()
    );
    SpanningForest {
        trees,
        component_of,
        initial_poses,
    }
}

fn pair_key(graph: &FloorGraph, e: usize) -> (crate::types::NodeId, crate::types::NodeId) {
    let edge = graph.edge(e);
    let (a, b) = (graph.node_id(edge.i), graph.node_id(edge.j));
    (a.min(b), a.max(b))
}

fn bfs_order(
    graph: &FloorGraph,
    tree_adjacency: &[Vec<usize>],
    root: usize,
) -> Vec<(usize, Option<usize>)> {
    let mut order = vec![(root, None)];
    let mut visited = vec![false; tree_adjacency.len()];
    visited[root] = true;
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        for &e in &tree_adjacency[node] {
            let next = graph.edge(e).other(node);
            if !visited[next] {
                visited[next] = true;
                order.push((next, Some(e)));
                queue.push_back(next);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        apartment_pairs, apartment_truth, assert_pose_close, graph_from_truth, set_confidence,
    };

    fn is_acyclic_spanning(graph: &FloorGraph, tree: &ComponentTree) -> bool {
        let mut uf = UnionFind::new(graph.node_count());
        for &e in &tree.tree_edges {
            let edge = graph.edge(e);
            if !uf.union(edge.i, edge.j) {
                return false;
            }
        }
        tree.nodes.iter().all(|&n| uf.connected(n, tree.root))
    }

    #[test]
    fn forest_has_n_minus_one_edges_per_component() {
        let truth = apartment_truth();
        let mut pairs = apartment_pairs();
        pairs.retain(|&(i, j)| i != 3 && j != 3);
        let mut graph = graph_from_truth(&truth, &pairs);
        graph.ensure_node(crate::types::NodeId(42));
        let mask = vec![true; graph.edge_count()];
        let forest = build_spanning_forest(&graph, &mask);
        // {0,1,2,4}, {3}, {42}
        assert_eq!(forest.trees.len(), 3);
        for tree in &forest.trees {
            assert_eq!(tree.tree_edges.len() + 1, tree.len());
            assert!(is_acyclic_spanning(&graph, tree));
        }
        assert!(forest.initial_poses[3].is_none());
        assert!(forest.initial_poses[5].is_none());
    }

    #[test]
    fn prefers_high_confidence_edges() {
        let truth = apartment_truth();
        let mut graph = graph_from_truth(&truth, &[(0, 1), (1, 2), (0, 2)]);
        set_confidence(&mut graph, 0, 0.3);
        set_confidence(&mut graph, 1, 0.9);
        set_confidence(&mut graph, 2, 0.8);
        let forest = build_spanning_forest(&graph, &[true, true, true]);
        let tree = &forest.trees[0];
        assert_eq!(tree.tree_edges, vec![1, 2]);
        // Node 2 carries 0.9 + 0.8.
        assert_eq!(tree.root, 2);
    }

    #[test]
    fn equal_confidence_breaks_ties_by_node_ids() {
        let truth = apartment_truth();
        let graph = graph_from_truth(&truth, &[(2, 1), (1, 0), (0, 2)]);
        let forest = build_spanning_forest(&graph, &[true, true, true]);
        // Pairs (1,2), (0,1), (0,2): (0,1) and (0,2) sort first.
        assert_eq!(forest.trees[0].tree_edges, vec![1, 2]);
        // All incident sums tie: the smallest id is the root.
        assert_eq!(forest.trees[0].root, 0);
    }

    #[test]
    fn propagated_poses_match_truth_up_to_root_frame() {
        let truth = apartment_truth();
        let graph = graph_from_truth(&truth, &apartment_pairs());
        let mask = vec![true; graph.edge_count()];
        let forest = build_spanning_forest(&graph, &mask);
        let root = forest.trees[0].root;
        let to_local = truth[root].inverse();
        for (node, expected) in truth.iter().enumerate() {
            let pose = forest.initial_poses[node].expect("connected node has a pose");
            assert_pose_close(&pose, &to_local.compose(expected), 1e-9);
        }
    }

    #[test]
    fn propagation_follows_a_chain_from_the_anchor() {
        let truth = apartment_truth();
        let graph = graph_from_truth(&truth, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let forest = build_spanning_forest(&graph, &[true; 4]);
        let tree = &forest.trees[0];
        let anchor = Pose2::new(-2.0, 1.0, 0.7);
        let to_anchor = anchor.compose(&truth[tree.root].inverse());

        let poses = tree.propagate(&graph, anchor, None);
        assert_eq!(poses.len(), 5);
        for &(node, pose) in &poses {
            assert_pose_close(&pose, &to_anchor.compose(&truth[node]), 1e-9);
        }

        // Overridden headings steer the translation of every child.
        let headings = vec![0.3; graph.node_count()];
        let steered = tree.propagate(&graph, anchor, Some(&headings));
        for &(node, pose) in &steered {
            assert!((pose.heading - 0.3).abs() < 1e-12);
            if let Some((_, Some(edge))) = tree.order.iter().find(|(n, _)| *n == node) {
                let e = graph.edge(*edge);
                let parent = e.other(node);
                let (_, parent_pose) = steered
                    .iter()
                    .find(|(n, _)| *n == parent)
                    .copied()
                    .expect("parent placed");
                let expected = parent_pose.compose(&e.relative_from(parent));
                assert!((pose.x - expected.x).abs() < 1e-9);
                assert!((pose.y - expected.y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn masked_edges_are_ignored() {
        let truth = apartment_truth();
        let graph = graph_from_truth(&truth, &[(0, 1), (1, 2), (2, 3)]);
        let forest = build_spanning_forest(&graph, &[true, false, true]);
        // {0,1}, {2,3} and the unconnected node 4.
        assert_eq!(forest.trees.len(), 3);
        assert_eq!(forest.tree_edge_mask(3), vec![true, false, true]);
        assert_ne!(forest.component_of[1], forest.component_of[2]);
    }
}
