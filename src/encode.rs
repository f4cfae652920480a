//! Layered encoding of edge labels into vertex colours.
//!
//! Automorphism solvers only understand vertex-coloured digraphs. A graph with
//! labelled (or parallel) edges is turned into such a digraph by assigning
//! each distinct edge label a binary code and stacking one copy of the node
//! set per bit of the code: layer `k` contains the edges whose code has bit `k`
//! set, and every node is threaded through the layers by vertical edges.
//!
//! ```text
//!   layer 1   (1,a) ---> (1,b)       edge a -> b with code 0b11
//!               ^          ^
//!   layer 0   (0,a) ---> (0,b)
//! ```
//!
//! Canonically labelling the encoded graph and reading back its layer-0 nodes
//! yields a labelling of the original graph consistent with its edge labels.
//! See section 14 of the nauty and Traces user guide for the construction.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::graph::{EdgeBundle, LabelledGraph, NodeId};
use crate::serialize::Term;

/// A node of a layered encoding: a copy of `node` in `layer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Layered<N> {
    /// Layer of the copy, `0` being the layer of the original nodes.
    pub layer: usize,
    /// The original node.
    pub node: N,
}

impl<N> Layered<N> {
    /// The layer-0 copy of `node`.
    pub fn base(node: N) -> Self {
        Self { layer: 0, node }
    }

    /// The vertex colour used for this copy when it is handed to an oracle.
    ///
    /// Layers are coloured apart so that automorphisms of the encoding never
    /// mix copies of different layers.
    pub fn colour(&self, label: &str) -> Term {
        Term::from((self.layer, label))
    }
}

/// A layered encoding of a graph with labelled edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeEncoding<N> {
    /// The encoded plain digraph.
    pub graph: LabelledGraph<Layered<N>>,
    /// Distinct edge labels in code order; label `i` has code `i + 1`.
    pub edge_labels: Vec<String>,
    /// Number of layers in the encoding.
    pub layers: usize,
}

impl<N: NodeId> EdgeEncoding<N> {
    /// The graph-level label recording the information discarded by the
    /// encoding, optionally combined with the original graph label.
    pub fn label_term(&self, original: Option<&str>) -> Term {
        let labels = Term::list(&self.edge_labels);
        match original {
            Some(label) => Term::from((label, labels)),
            None => labels,
        }
    }
}

/// Number of layers needed to give each of `num_labels` labels a distinct
/// non-zero code, `ceil(log2(num_labels + 1))`, and at least one.
pub fn layer_count(num_labels: usize) -> usize {
    let bits = (usize::BITS - num_labels.leading_zeros()) as usize;
    bits.max(1)
}

/// Encodes the edges of `graph` into layers.
///
/// Every edge bundle counts as a single edge labelled with its
/// [`EdgeBundle::key`], so parallel edges are encoded through their
/// multiplicity. The labels are ordered by their rendered keys; the order
/// only shapes the intermediate encoding, not the isomorphism class it
/// represents. Node labels are inherited by every copy, the graph-level label
/// is dropped.
///
/// # Example
///
/// ```
/// # use dihash::{encode::encode_edge_labels, LabelledGraph};
/// let mut graph = LabelledGraph::from_edges([(0, "n"), (1, "n")], []).unwrap();
/// graph.add_labelled_edge(0, 1, "x").unwrap();
/// graph.add_labelled_edge(1, 0, "y").unwrap();
/// let encoding = encode_edge_labels(&graph);
/// assert_eq!(encoding.layers, 2);
/// assert_eq!(encoding.graph.node_count(), 4);
/// ```
pub fn encode_edge_labels<N: NodeId>(graph: &LabelledGraph<N>) -> EdgeEncoding<N> {
    let edge_keys: BTreeMap<String, usize> = graph
        .edges_iter()
        .map(|(_, _, bundle)| bundle.key().to_string())
        .sorted()
        .dedup()
        .enumerate()
        .map(|(i, key)| (key, i + 1))
        .collect();
    let layers = layer_count(edge_keys.len());

    let mut encoded = LabelledGraph::new();
    for layer in 0..layers {
        for (node, label) in graph.labelled_nodes() {
            encoded.add_node(
                Layered {
                    layer,
                    node: node.clone(),
                },
                label,
            );
        }
    }

    let mut add = |from: Layered<N>, to: Layered<N>| {
        encoded.insert_edges(from, to, EdgeBundle::single());
    };
    for node in graph.nodes_iter() {
        for layer in 1..layers {
            add(
                Layered {
                    layer: layer - 1,
                    node: node.clone(),
                },
                Layered {
                    layer,
                    node: node.clone(),
                },
            );
        }
    }
    for (from, to, bundle) in graph.edges_iter() {
        let code = edge_keys[&bundle.key().to_string()];
        for layer in (0..layers).filter(|layer| (code >> layer) & 1 == 1) {
            add(
                Layered {
                    layer,
                    node: from.clone(),
                },
                Layered {
                    layer,
                    node: to.clone(),
                },
            );
        }
    }

    tracing::trace!(
        nodes = graph.node_count(),
        edge_labels = edge_keys.len(),
        layers,
        "encoded edge labels"
    );

    EdgeEncoding {
        graph: encoded,
        edge_labels: edge_keys.into_keys().collect(),
        layers,
    }
}
