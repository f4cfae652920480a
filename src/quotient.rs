//! Quotients of graphs by their automorphism orbits.
//!
//! Collapsing every orbit of the automorphism group into a single node folds
//! away structural symmetry: a directed cycle of any length collapses into a
//! single node with a self-loop. Collapsing can create new symmetry, so
//! [`quotient_fixpoint`] repeats the construction until the graph stops
//! shrinking.

use std::collections::BTreeMap;

use crate::encode::{encode_edge_labels, Layered};
use crate::graph::{InvalidGraphError, LabelledGraph, NodeId};
use crate::oracle::{CanonicalOracle, IndexedGraph};
use crate::HashError;

/// Automorphism orbits of `graph`, each sorted, in order of their least
/// member.
///
/// Graphs with parallel or labelled edges are encoded first, and only the
/// orbits of the layer-0 copies are kept.
fn orbits<N: NodeId>(
    graph: &LabelledGraph<N>,
    oracle: &(impl CanonicalOracle + ?Sized),
) -> Result<Vec<Vec<N>>, HashError> {
    if graph.is_simple() {
        let indexed = IndexedGraph::with_labels(graph)?;
        let orbits = indexed.orbits(oracle)?;
        return Ok(orbits
            .into_iter()
            .map(|orbit| orbit.into_iter().cloned().collect())
            .collect());
    }

    let encoding = encode_edge_labels(graph);
    let indexed = IndexedGraph::new(&encoding.graph, |n: &Layered<N>, label| n.colour(label))?;
    let orbits = indexed.orbits(oracle)?;
    Ok(orbits
        .into_iter()
        .filter(|orbit| orbit.first().is_some_and(|n| n.layer == 0))
        .map(|orbit| orbit.into_iter().map(|n| n.node.clone()).collect())
        .collect())
}

/// Collapses each automorphism orbit of `graph` into a single node.
///
/// Quotient nodes are numbered `0..k` in ascending order of the least member
/// of their orbit and carry the orbit's shared label. The edges leaving an
/// orbit are those of its least member, redirected to the orbits of their
/// targets; parallel edges and edge labels are kept. The graph-level label is
/// preserved.
///
/// Returns the map from each node to its quotient node, and the quotient.
///
/// # Example
///
/// ```
/// # use dihash::{quotient::quotient_graph, oracle::RefinementOracle, LabelledGraph};
/// let cycle = LabelledGraph::from_edges(
///     (0..4).map(|n| (n, "x")),
///     (0..4).map(|n| (n, (n + 1) % 4)),
/// ).unwrap();
/// let (sigma, quotient) = quotient_graph(&cycle, &RefinementOracle::new()).unwrap();
/// assert_eq!(quotient.node_count(), 1);
/// assert_eq!(quotient.edge_count(), 1);
/// assert!(sigma.values().all(|&q| q == 0));
/// ```
pub fn quotient_graph<N: NodeId>(
    graph: &LabelledGraph<N>,
    oracle: &(impl CanonicalOracle + ?Sized),
) -> Result<(BTreeMap<N, usize>, LabelledGraph<usize>), HashError> {
    let orbits = orbits(graph, oracle)?;

    let sigma: BTreeMap<N, usize> = orbits
        .iter()
        .enumerate()
        .flat_map(|(i, orbit)| orbit.iter().map(move |n| (n.clone(), i)))
        .collect();

    let mut quotient = LabelledGraph::new();
    quotient.set_label(graph.label().map(str::to_string));
    let representatives: Vec<&N> = orbits.iter().filter_map(|orbit| orbit.first()).collect();
    for (i, &rep) in representatives.iter().enumerate() {
        let label = graph
            .node_label(rep)
            .ok_or_else(|| InvalidGraphError::UnknownNode {
                node: format!("{rep:?}"),
            })?;
        quotient.add_node(i, label);
    }
    for (i, &rep) in representatives.iter().enumerate() {
        for (target, bundle) in graph.successors(rep) {
            quotient.insert_edges(i, sigma[target], bundle.clone());
        }
    }

    Ok((sigma, quotient))
}

/// Repeats [`quotient_graph`] until the node count stops decreasing.
///
/// The returned map sends each node of `graph` to its node in the final
/// quotient. Applying the fixpoint to its own output is the identity.
pub fn quotient_fixpoint<N: NodeId>(
    graph: &LabelledGraph<N>,
    oracle: &(impl CanonicalOracle + ?Sized),
) -> Result<(BTreeMap<N, usize>, LabelledGraph<usize>), HashError> {
    let (mut sigma, mut quotient) = quotient_graph(graph, oracle)?;
    let mut previous = graph.node_count();
    let mut rounds = 1;
    while quotient.node_count() < previous {
        tracing::trace!(from = previous, to = quotient.node_count(), "collapsed orbits");
        previous = quotient.node_count();
        let (step, next) = quotient_graph(&quotient, oracle)?;
        for node in sigma.values_mut() {
            *node = step[&*node];
        }
        quotient = next;
        rounds += 1;
    }
    tracing::debug!(
        nodes = graph.node_count(),
        quotient_nodes = quotient.node_count(),
        rounds,
        "reached quotient fixpoint"
    );
    Ok((sigma, quotient))
}
