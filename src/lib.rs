#![warn(missing_docs)]
//! `dihash` computes isomorphism-invariant hashes of directed labelled graphs.
//!
//! Structurally identical graphs always hash identically, whatever their node
//! identifiers, and nodes playing the same structural role (related by an
//! automorphism) receive identical node hashes. Structurally distinct graphs
//! hash differently, up to collisions of the underlying string hash function.
//!
//! Graphs are [`LabelledGraph`] values: nodes carry a string label, edges may
//! be parallel and carry labels, and the graph itself may carry a label. The
//! hashers are built on a canonical labelling of the graph, computed by a
//! [`CanonicalOracle`], and on a fixed serialization of the canonical form
//! (see [`serialize`]).
//!
//! - [`hash_graph`] hashes a whole graph and optionally each of its nodes.
//!   With `apply_quotient`, automorphism orbits are first collapsed until a
//!   fixpoint, so that e.g. directed cycles of any length hash identically.
//! - [`hash_graph_node_set`] hashes the role of a set of nodes within a graph.
//! - [`merkle_hash_graph`] hashes a possibly cyclic graph component by
//!   component, so that the hash of a node only depends on what it reaches.
//!
//! The free functions use SHA-256 and the bundled [`RefinementOracle`]; a
//! [`GraphHasher`] can be configured with other hash functions and oracles.
//!
//! # Example
//!
//! ```
//! use dihash::{hash_graph, LabelledGraph};
//! use dihash::hash::Sha256Hex;
//!
//! // Two directed triangles, with different node identifiers.
//! let g1 = LabelledGraph::from_edges(
//!     [(0, "x"), (1, "x"), (2, "x")],
//!     [(0, 1), (1, 2), (2, 0)],
//! ).unwrap();
//! let g2 = LabelledGraph::from_edges(
//!     [("a", "x"), ("b", "x"), ("c", "x")],
//!     [("a", "c"), ("c", "b"), ("b", "a")],
//! ).unwrap();
//!
//! let (h1, nodes1) = hash_graph(&g1, true, false, Sha256Hex).unwrap();
//! let (h2, _) = hash_graph(&g2, false, false, Sha256Hex).unwrap();
//! assert_eq!(h1, h2);
//!
//! // All nodes of a cycle are symmetric.
//! let nodes1 = nodes1.unwrap();
//! assert_eq!(nodes1[&0], nodes1[&1]);
//! ```
//!
//! # Features
//!
//! - `serde` enables serialization and deserialization of graphs, of
//!   condensations and of Merkle hashes, so that node hashes can be persisted
//!   and reused across calls.
//! - `proptest` enables the [`proptest`] strategies generating random graphs.
//!
use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

pub mod algorithms;
pub mod encode;
pub mod graph;
pub mod hash;
pub mod oracle;
pub mod quotient;
pub mod serialize;

#[cfg(feature = "proptest")]
pub mod proptest;

#[doc(inline)]
pub use crate::graph::{EdgeBundle, InvalidGraphError, LabelledGraph, NodeId};
#[doc(inline)]
pub use crate::hash::{
    GraphDigest, GraphHasher, HashFunction, HashFunctionError, HashOptions, MerkleHashes,
    NodeSetDigest, Sha256Hex,
};
#[doc(inline)]
pub use crate::oracle::{CanonicalOracle, OracleError, RefinementOracle};

/// Error returned by the hashing operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HashError {
    /// The input graph, or the graph handed to the oracle, is malformed.
    #[error(transparent)]
    InvalidGraph(#[from] InvalidGraphError),
    /// The canonical labelling oracle failed.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// The string hash function failed.
    #[error(transparent)]
    HashFunction(#[from] HashFunctionError),
}

/// Hashes a whole graph and, if `hash_nodes`, each of its nodes.
///
/// With `apply_quotient`, the graph is first reduced by
/// [`quotient_fixpoint`], and each node is hashed as its quotient node.
///
/// See [`GraphHasher::hash_graph`].
pub fn hash_graph<N: NodeId>(
    graph: &LabelledGraph<N>,
    hash_nodes: bool,
    apply_quotient: bool,
    hash_fn: impl HashFunction,
) -> Result<(String, Option<BTreeMap<N, String>>), HashError> {
    let options = HashOptions {
        hash_nodes,
        apply_quotient,
    };
    let digest = GraphHasher::new()
        .with_hash_fn(hash_fn)
        .hash_graph(graph, options)?;
    Ok((digest.graph_hash, digest.node_hashes))
}

/// Hashes a graph with the nodes of `node_set` marked, and the members of
/// the set in that graph.
///
/// See [`GraphHasher::hash_graph_node_set`].
///
/// # Example
///
/// ```
/// use dihash::{hash_graph_node_set, LabelledGraph, Sha256Hex};
/// use std::collections::BTreeSet;
///
/// let square = LabelledGraph::from_edges(
///     (1..=4).map(|n| (n, "x")),
///     [(1, 2), (2, 3), (3, 4), (4, 1)],
/// ).unwrap();
/// let hash = |set: &[usize]| {
///     let set: BTreeSet<usize> = set.iter().copied().collect();
///     hash_graph_node_set(&square, &set, false, Sha256Hex).unwrap().0
/// };
/// assert_eq!(hash(&[1, 3]), hash(&[2, 4]));
/// assert_ne!(hash(&[1, 2]), hash(&[1, 3]));
/// ```
pub fn hash_graph_node_set<N: NodeId>(
    graph: &LabelledGraph<N>,
    node_set: &BTreeSet<N>,
    apply_quotient: bool,
    hash_fn: impl HashFunction,
) -> Result<(String, BTreeMap<N, String>), HashError> {
    let digest = GraphHasher::new()
        .with_hash_fn(hash_fn)
        .hash_graph_node_set(graph, node_set, apply_quotient)?;
    Ok((digest.graph_hash, digest.node_hashes))
}

/// Hashes a possibly cyclic graph component by component.
///
/// See [`GraphHasher::merkle_hash_graph`].
pub fn merkle_hash_graph<N: NodeId>(
    graph: &LabelledGraph<N>,
    nodes_to_hash: Option<&[N]>,
    apply_quotient: bool,
    precomputed_hashes: Option<&BTreeMap<N, String>>,
    hash_fn: impl HashFunction,
) -> Result<MerkleHashes<N>, HashError> {
    GraphHasher::new().with_hash_fn(hash_fn).merkle_hash_graph(
        graph,
        nodes_to_hash,
        apply_quotient,
        precomputed_hashes,
    )
}

/// Collapses the automorphism orbits of `graph` once, using the
/// [`RefinementOracle`].
///
/// See [`quotient::quotient_graph`].
pub fn quotient_graph<N: NodeId>(
    graph: &LabelledGraph<N>,
) -> Result<(BTreeMap<N, usize>, LabelledGraph<usize>), HashError> {
    quotient::quotient_graph(graph, &RefinementOracle::new())
}

/// Collapses automorphism orbits until a fixpoint, using the
/// [`RefinementOracle`].
///
/// See [`quotient::quotient_fixpoint`].
pub fn quotient_fixpoint<N: NodeId>(
    graph: &LabelledGraph<N>,
) -> Result<(BTreeMap<N, usize>, LabelledGraph<usize>), HashError> {
    quotient::quotient_fixpoint(graph, &RefinementOracle::new())
}
