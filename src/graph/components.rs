use super::{FloorGraph, UnionFind};

/// A connected component over a subset of the floor's edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// Node indices, ascending.
    pub nodes: Vec<usize>,
    /// Edge indices (restricted to the mask), ascending.
    pub edges: Vec<usize>,
}

impl Component {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Splits the floor into connected components using only edges whose mask
/// entry is true. Every node belongs to exactly one component; isolated nodes
/// form singleton components. Components are ordered by their smallest node
/// index.
pub fn connected_components(graph: &FloorGraph, mask: &[bool]) -> Vec<Component> {
    let n = graph.node_count();
    let mut uf = UnionFind::new(n);
    for (idx, edge) in graph.edges().iter().enumerate() {
        if mask[idx] {
            uf.union(edge.i, edge.j);
        }
    }

    let mut slot_of_root = vec![usize::MAX; n];
    let mut components: Vec<Component> = Vec::new();
    for node in 0..n {
        let root = uf.find(node);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = components.len();
            components.push(Component {
                nodes: Vec::new(),
                edges: Vec::new(),
            });
        }
        components[slot_of_root[root]].nodes.push(node);
    }
    for (idx, edge) in graph.edges().iter().enumerate() {
        if mask[idx] {
            let root = uf.find(edge.i);
            components[slot_of_root[root]].edges.push(idx);
        }
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::types::{InlierLabel, NodeId, Pose2, Provenance};

    fn graph_with(pairs: &[(u32, u32)], extra_nodes: &[u32]) -> FloorGraph {
        let mut graph = FloorGraph::new("f");
        for &id in extra_nodes {
            graph.ensure_node(NodeId(id));
        }
        for (k, &(a, b)) in pairs.iter().enumerate() {
            let i = graph.ensure_node(NodeId(a));
            let j = graph.ensure_node(NodeId(b));
            graph.push_edge(Edge {
                source_index: k,
                i,
                j,
                relative: Pose2::identity(),
                confidence: 1.0,
                provenance: Provenance::Door,
                label: InlierLabel::Unknown,
            });
        }
        graph
    }

    #[test]
    fn splits_disconnected_parts() {
        let graph = graph_with(&[(0, 1), (1, 2), (3, 4)], &[]);
        let comps = connected_components(&graph, &[true, true, true]);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].nodes, vec![0, 1, 2]);
        assert_eq!(comps[0].edges, vec![0, 1]);
        assert_eq!(comps[1].nodes, vec![3, 4]);
    }

    #[test]
    fn masked_edges_do_not_connect() {
        let graph = graph_with(&[(0, 1), (1, 2)], &[7]);
        let comps = connected_components(&graph, &[true, false]);
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[0].nodes, vec![0]);
        assert!(comps[0].edges.is_empty());
        assert_eq!(comps[1].nodes, vec![1, 2]);
        assert_eq!(comps[2].nodes, vec![3]);
    }
}
