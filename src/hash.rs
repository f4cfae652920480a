//! Isomorphism-invariant graph hashers.
//!
//! All hashers are methods of [`GraphHasher`], which bundles the string hash
//! function used to produce digests and the [`CanonicalOracle`] used to
//! canonicalise graphs. The free functions at the crate root use the default
//! SHA-256 hash and [`RefinementOracle`].

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::graph::{LabelledGraph, NodeId};
use crate::oracle::{CanonicalOracle, RefinementOracle};
use crate::quotient;
use crate::HashError;

mod graph;
mod merkle;
mod node_set;

pub use graph::GraphDigest;
pub use merkle::MerkleHashes;
pub use node_set::NodeSetDigest;

/// A function from strings to digest strings.
///
/// Any closure `Fn(&str) -> String` is a hash function. Functions that are
/// not collision resistant should only be used for debugging.
pub trait HashFunction {
    /// Hashes `input`.
    fn hash_str(&self, input: &str) -> Result<String, HashFunctionError>;
}

impl<F: Fn(&str) -> String> HashFunction for F {
    #[inline]
    fn hash_str(&self, input: &str) -> Result<String, HashFunctionError> {
        Ok(self(input))
    }
}

/// SHA-256, rendered as 64 lowercase hexadecimal digits.
///
/// # Example
///
/// ```
/// # use dihash::hash::{HashFunction, Sha256Hex};
/// assert_eq!(
///     Sha256Hex.hash_str("").unwrap(),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha256Hex;

impl HashFunction for Sha256Hex {
    fn hash_str(&self, input: &str) -> Result<String, HashFunctionError> {
        Ok(hex::encode(Sha256::digest(input.as_bytes())))
    }
}

/// Error raised by a [`HashFunction`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("hash function failed: {message}")]
pub struct HashFunctionError {
    message: String,
}

impl HashFunctionError {
    /// Create a new error with a description of the failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Options of a whole-graph hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HashOptions {
    /// Also compute a hash for every node.
    pub hash_nodes: bool,
    /// Collapse automorphism orbits until a fixpoint before hashing.
    ///
    /// Graphs sharing the same iterated quotient, such as cycles of different
    /// lengths, then hash identically.
    pub apply_quotient: bool,
}

impl HashOptions {
    /// Options hashing the graph only, without quotienting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`HashOptions::hash_nodes`].
    pub fn hash_nodes(mut self, hash_nodes: bool) -> Self {
        self.hash_nodes = hash_nodes;
        self
    }

    /// Sets [`HashOptions::apply_quotient`].
    pub fn apply_quotient(mut self, apply_quotient: bool) -> Self {
        self.apply_quotient = apply_quotient;
        self
    }
}

/// Hashes graphs with a given hash function and oracle.
///
/// # Example
///
/// ```
/// # use dihash::{hash::{GraphHasher, HashOptions}, LabelledGraph};
/// let hasher = GraphHasher::new();
/// let g1 = LabelledGraph::from_edges([(0, "a"), (1, "b")], [(0, 1)]).unwrap();
/// let g2 = LabelledGraph::from_edges([("x", "b"), ("y", "a")], [("y", "x")]).unwrap();
///
/// let options = HashOptions::new().hash_nodes(true);
/// let d1 = hasher.hash_graph(&g1, options).unwrap();
/// let d2 = hasher.hash_graph(&g2, options).unwrap();
/// assert_eq!(d1.graph_hash, d2.graph_hash);
/// assert_eq!(d1.node_hashes.unwrap()[&0], d2.node_hashes.unwrap()["y"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct GraphHasher<H = Sha256Hex, O = RefinementOracle> {
    hash_fn: H,
    oracle: O,
}

impl GraphHasher {
    /// A hasher using SHA-256 and the [`RefinementOracle`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: HashFunction, O: CanonicalOracle> GraphHasher<H, O> {
    /// Replaces the hash function.
    pub fn with_hash_fn<H2: HashFunction>(self, hash_fn: H2) -> GraphHasher<H2, O> {
        GraphHasher {
            hash_fn,
            oracle: self.oracle,
        }
    }

    /// Replaces the canonical labelling oracle.
    pub fn with_oracle<O2: CanonicalOracle>(self, oracle: O2) -> GraphHasher<H, O2> {
        GraphHasher {
            hash_fn: self.hash_fn,
            oracle,
        }
    }

    /// The hash function.
    pub fn hash_fn(&self) -> &H {
        &self.hash_fn
    }

    /// The canonical labelling oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Hashes a whole graph and, if requested, each of its nodes.
    ///
    /// Isomorphic graphs get equal graph hashes, and nodes related by an
    /// isomorphism or automorphism get equal node hashes.
    pub fn hash_graph<N: NodeId>(
        &self,
        graph: &LabelledGraph<N>,
        options: HashOptions,
    ) -> Result<GraphDigest<N>, HashError> {
        graph::hash_graph(self, graph, options)
    }

    /// Hashes the structural role of a set of nodes.
    ///
    /// Two sets get equal graph hashes iff an automorphism of the graph maps
    /// one onto the other. Sets of fewer than two nodes are not marked, so
    /// they hash like the bare graph.
    pub fn hash_graph_node_set<N: NodeId>(
        &self,
        graph: &LabelledGraph<N>,
        node_set: &BTreeSet<N>,
        apply_quotient: bool,
    ) -> Result<NodeSetDigest<N>, HashError> {
        node_set::hash_graph_node_set(self, graph, node_set, apply_quotient)
    }

    /// Hashes a possibly cyclic graph component by component.
    ///
    /// Each strongly connected component is hashed after the components it
    /// points to, with the label of each member sealed with the hashes of its
    /// successors outside the component. The hash of a node thus only depends
    /// on the part of the graph it reaches.
    ///
    /// Components of `nodes_to_hash` are hashed, or every source component if
    /// `None`, together with everything they reach that has no hash in
    /// `precomputed_hashes`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGraphError::UnknownNode`] if a node of
    /// `nodes_to_hash` is missing from the graph.
    ///
    /// [`InvalidGraphError::UnknownNode`]: crate::InvalidGraphError::UnknownNode
    pub fn merkle_hash_graph<N: NodeId>(
        &self,
        graph: &LabelledGraph<N>,
        nodes_to_hash: Option<&[N]>,
        apply_quotient: bool,
        precomputed_hashes: Option<&BTreeMap<N, String>>,
    ) -> Result<MerkleHashes<N>, HashError> {
        merkle::merkle_hash_graph(self, graph, nodes_to_hash, apply_quotient, precomputed_hashes)
    }

    /// Collapses the automorphism orbits of `graph` once. See
    /// [`quotient::quotient_graph`].
    pub fn quotient_graph<N: NodeId>(
        &self,
        graph: &LabelledGraph<N>,
    ) -> Result<(BTreeMap<N, usize>, LabelledGraph<usize>), HashError> {
        quotient::quotient_graph(graph, &self.oracle)
    }

    /// Collapses automorphism orbits until the node count stops decreasing.
    /// See [`quotient::quotient_fixpoint`].
    pub fn quotient_fixpoint<N: NodeId>(
        &self,
        graph: &LabelledGraph<N>,
    ) -> Result<(BTreeMap<N, usize>, LabelledGraph<usize>), HashError> {
        quotient::quotient_fixpoint(graph, &self.oracle)
    }

    /// Hashes the canonical serialization of a sequence of terms.
    pub(crate) fn hash_terms<'a>(
        &self,
        terms: impl IntoIterator<Item = &'a crate::serialize::Term>,
    ) -> Result<String, HashFunctionError> {
        self.hash_fn.hash_str(&crate::serialize::serialize(terms))
    }
}
