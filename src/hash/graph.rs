//! Canonical hashing of whole graphs.

use std::collections::{btree_map::Entry, BTreeMap};

use crate::encode::{encode_edge_labels, Layered};
use crate::graph::{LabelledGraph, NodeId};
use crate::oracle::{CanonicalOracle, IndexedGraph};
use crate::quotient::quotient_fixpoint;
use crate::serialize::Term;
use crate::HashError;

use super::{GraphHasher, HashFunction, HashFunctionError, HashOptions};

/// Hash of a graph, and optionally of each of its nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphDigest<N> {
    /// Hash of the whole graph.
    pub graph_hash: String,
    /// Hash of every node, if requested.
    pub node_hashes: Option<BTreeMap<N, String>>,
}

/// A graph hash, with the orbit index of each node of the hashed graph.
struct Canonical<M> {
    graph_hash: String,
    orbit_index: Option<BTreeMap<M, usize>>,
}

pub(super) fn hash_graph<H, O, N>(
    hasher: &GraphHasher<H, O>,
    graph: &LabelledGraph<N>,
    options: HashOptions,
) -> Result<GraphDigest<N>, HashError>
where
    H: HashFunction,
    O: CanonicalOracle,
    N: NodeId,
{
    let (graph_hash, node_hashes) = if options.apply_quotient {
        let (sigma, quotient) = quotient_fixpoint(graph, hasher.oracle())?;
        let Canonical {
            graph_hash,
            orbit_index,
        } = canonical_hash(hasher, &quotient, options.hash_nodes)?;
        let node_hashes = orbit_index
            .map(|orbit_index| {
                let orbit_of = sigma.iter().map(|(n, q)| (n, orbit_index[q]));
                hash_nodes(hasher, &graph_hash, orbit_of)
            })
            .transpose()?;
        (graph_hash, node_hashes)
    } else {
        let Canonical {
            graph_hash,
            orbit_index,
        } = canonical_hash(hasher, graph, options.hash_nodes)?;
        let node_hashes = orbit_index
            .map(|orbit_index| hash_nodes(hasher, &graph_hash, orbit_index.iter().map(|(n, &o)| (n, o))))
            .transpose()?;
        (graph_hash, node_hashes)
    };

    tracing::trace!(
        nodes = graph.node_count(),
        apply_quotient = options.apply_quotient,
        graph_hash = %graph_hash,
        "hashed graph"
    );
    Ok(GraphDigest {
        graph_hash,
        node_hashes,
    })
}

/// Hashes the canonical form of `graph`, computing orbits if `with_orbits`.
///
/// Graphs with parallel or labelled edges are hashed through their layered
/// encoding, whose edge keys are recorded in the serialized graph label.
fn canonical_hash<H, O, M>(
    hasher: &GraphHasher<H, O>,
    graph: &LabelledGraph<M>,
    with_orbits: bool,
) -> Result<Canonical<M>, HashError>
where
    H: HashFunction,
    O: CanonicalOracle,
    M: NodeId,
{
    if graph.is_simple() {
        let indexed = IndexedGraph::with_labels(graph)?;
        let label = graph.label().map(Term::str);
        let (graph_hash, orbit_index) = hash_indexed(hasher, &indexed, label, with_orbits)?;
        let orbit_index = orbit_index.map(|orbit_index| {
            orbit_index
                .into_iter()
                .enumerate()
                .map(|(i, o)| (indexed.node(i).clone(), o))
                .collect()
        });
        return Ok(Canonical {
            graph_hash,
            orbit_index,
        });
    }

    let encoding = encode_edge_labels(graph);
    let indexed = IndexedGraph::new(&encoding.graph, |n: &Layered<M>, label| n.colour(label))?;
    let label = Some(encoding.label_term(graph.label()));
    let (graph_hash, orbit_index) = hash_indexed(hasher, &indexed, label, with_orbits)?;
    let orbit_index = orbit_index.map(|orbit_index| {
        orbit_index
            .into_iter()
            .enumerate()
            .map(|(i, o)| (indexed.node(i), o))
            .filter(|(n, _)| n.layer == 0)
            .map(|(n, o)| (n.node.clone(), o))
            .collect()
    });
    Ok(Canonical {
        graph_hash,
        orbit_index,
    })
}

/// Serializes and hashes an indexed graph in canonical order.
///
/// The orbit index of each vertex is its orbit's position when orbits are
/// sorted by their least canonical position.
fn hash_indexed<H, O, M>(
    hasher: &GraphHasher<H, O>,
    indexed: &IndexedGraph<'_, M>,
    label: Option<Term>,
    with_orbits: bool,
) -> Result<(String, Option<Vec<usize>>), HashError>
where
    H: HashFunction,
    O: CanonicalOracle,
    M: NodeId,
{
    let (order, orbits) = if with_orbits {
        let (order, orbits) = indexed.analyze(hasher.oracle())?;
        (order, Some(orbits))
    } else {
        (indexed.canonical_order(hasher.oracle())?, None)
    };

    let (colours, edges) = indexed.relabel(&order);
    let terms: Vec<Term> = label
        .into_iter()
        .chain([
            Term::List(colours.into_iter().cloned().collect()),
            Term::List(edges.into_iter().map(Term::from).collect()),
        ])
        .collect();
    let graph_hash = hasher.hash_terms(&terms)?;

    let orbit_index = orbits.map(|mut orbits| {
        let mut position = vec![0; order.len()];
        for (pos, &i) in order.iter().enumerate() {
            position[i] = pos;
        }
        orbits.sort_by_key(|orbit| orbit.iter().map(|&i| position[i]).min());
        let mut orbit_index = vec![0; order.len()];
        for (k, orbit) in orbits.iter().enumerate() {
            for &i in orbit {
                orbit_index[i] = k;
            }
        }
        orbit_index
    });
    Ok((graph_hash, orbit_index))
}

/// Hashes each node from the index of its orbit and the graph hash.
fn hash_nodes<'n, H, O, N>(
    hasher: &GraphHasher<H, O>,
    graph_hash: &str,
    orbit_of: impl IntoIterator<Item = (&'n N, usize)>,
) -> Result<BTreeMap<N, String>, HashFunctionError>
where
    H: HashFunction,
    O: CanonicalOracle,
    N: NodeId + 'n,
{
    let mut by_orbit: BTreeMap<usize, String> = BTreeMap::new();
    let mut hashes = BTreeMap::new();
    for (node, orbit) in orbit_of {
        let hash = match by_orbit.entry(orbit) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry
                .insert(hasher.hash_terms(&[Term::Int(orbit), Term::str(graph_hash)])?)
                .clone(),
        };
        hashes.insert(node.clone(), hash);
    }
    Ok(hashes)
}
