//! Strategies generating random labelled graphs, and isomorphic copies of
//! them, for property testing.

use crate::graph::{EdgeBundle, LabelledGraph};
use proptest::prelude::*;
use rand::seq::SliceRandom;

/// Node labels used by the generated graphs.
const NODE_LABELS: [&str; 3] = ["a", "b", "c"];

/// Edge labels used by [`gen_multigraph`].
const EDGE_LABELS: [&str; 2] = ["x", "y"];

prop_compose! {
    /// A random graph with labelled nodes but no edges.
    ///
    /// The graph has between 1 and `max_n_nodes` nodes, numbered from zero.
    fn gen_nodes(max_n_nodes: usize)(
        labels in prop::collection::vec(prop::sample::select(NODE_LABELS.to_vec()), 1..=max_n_nodes)
    ) -> LabelledGraph<usize> {
        let mut graph = LabelledGraph::new();
        for (node, label) in labels.into_iter().enumerate() {
            graph.add_node(node, label);
        }
        graph
    }
}

prop_compose! {
    /// A random plain digraph.
    ///
    /// With at least 1 and at most `max_n_nodes` nodes and at most
    /// `max_n_edges` edges, self-loops allowed, without parallel or labelled
    /// edges.
    pub fn gen_digraph(max_n_nodes: usize, max_n_edges: usize)(
        graph in gen_nodes(max_n_nodes),
        edges in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 0..=max_n_edges),
    ) -> LabelledGraph<usize> {
        let mut graph = graph;
        let n = graph.node_count();
        for (from, to) in edges {
            let (from, to) = (from.index(n), to.index(n));
            if graph.successors(&from).all(|(t, _)| *t != to) {
                graph.insert_edges(from, to, EdgeBundle::single());
            }
        }
        graph
    }
}

prop_compose! {
    /// A random multigraph.
    ///
    /// With at least 1 and at most `max_n_nodes` nodes and at most
    /// `max_n_edges` edges, which may be parallel and may carry a label.
    pub fn gen_multigraph(max_n_nodes: usize, max_n_edges: usize)(
        graph in gen_nodes(max_n_nodes),
        edges in prop::collection::vec(
            (
                any::<prop::sample::Index>(),
                any::<prop::sample::Index>(),
                prop::option::of(prop::sample::select(EDGE_LABELS.to_vec())),
            ),
            0..=max_n_edges,
        ),
    ) -> LabelledGraph<usize> {
        let mut graph = graph;
        let n = graph.node_count();
        for (from, to, label) in edges {
            let bundle = EdgeBundle::with_edges(label.map(str::to_string), 1);
            graph.insert_edges(from.index(n), to.index(n), bundle);
        }
        graph
    }
}

/// A random graph from `graph`, and a copy of it with its nodes permuted.
///
/// Returns a tuple of
///  - `graph`, the generated graph,
///  - `permuted`, the same graph with every node `n` renamed to
///    `permutation[n]`,
///  - `permutation`, a random permutation of the nodes.
pub fn gen_isomorphic_pair(
    graph: impl Strategy<Value = LabelledGraph<usize>>,
) -> impl Strategy<Value = (LabelledGraph<usize>, LabelledGraph<usize>, Vec<usize>)> {
    graph.prop_perturb(|graph, mut rng| {
        let mut permutation: Vec<usize> = (0..graph.node_count()).collect();
        permutation.shuffle(&mut rng);

        let mut permuted = LabelledGraph::new();
        if let Some(label) = graph.label() {
            permuted.set_label(Some(label.to_string()));
        }
        for (node, label) in graph.labelled_nodes() {
            permuted.add_node(permutation[*node], label);
        }
        for (from, to, bundle) in graph.edges_iter() {
            permuted.insert_edges(permutation[*from], permutation[*to], bundle.clone());
        }
        (graph, permuted, permutation)
    })
}
