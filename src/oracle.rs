//! Canonical labelling and automorphism orbits of vertex-coloured digraphs.
//!
//! Computing a canonical vertex order and the orbits of the automorphism
//! group is delegated to a [`CanonicalOracle`], working on the index-based
//! [`OracleGraph`]. [`IndexedGraph`] translates a [`LabelledGraph`] to that
//! representation and back.
//!
//! The crate ships [`RefinementOracle`], an exact individualisation-refinement
//! search. Bindings to dedicated solvers such as nauty or Traces can be used
//! instead by implementing the trait.
//!
//! [`LabelledGraph`]: crate::LabelledGraph

mod adapter;
mod refine;

pub use adapter::{analyze_graph, IndexedGraph};
pub use refine::RefinementOracle;

use bitvec::bitvec;
use smallvec::SmallVec;
use thiserror::Error;

use crate::graph::InvalidGraphError;

/// Successor list of a vertex.
pub type Successors = SmallVec<[usize; 4]>;

/// A vertex-coloured digraph on the vertices `0..n`.
///
/// The colour classes form an *ordered* partition: isomorphisms must map
/// each class onto the class at the same position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleGraph {
    successors: Vec<Successors>,
    predecessors: Vec<Successors>,
    colours: Vec<Vec<usize>>,
}

impl OracleGraph {
    /// Creates a graph from successor lists and an ordered colour partition.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidGraphError`] if a successor is out of range or
    /// listed twice, or if the colour classes do not cover every vertex
    /// exactly once.
    pub fn new(
        successors: Vec<Successors>,
        colours: Vec<Vec<usize>>,
    ) -> Result<Self, InvalidGraphError> {
        let n = successors.len();
        let mut predecessors = vec![Successors::new(); n];
        let mut seen = bitvec![0; n];
        for (vertex, succs) in successors.iter().enumerate() {
            seen.fill(false);
            for &target in succs {
                if target >= n {
                    return Err(InvalidGraphError::MalformedAdjacency {
                        vertex,
                        reason: format!("successor {target} out of range for {n} vertices"),
                    });
                }
                if seen.replace(target, true) {
                    return Err(InvalidGraphError::MalformedAdjacency {
                        vertex,
                        reason: format!("parallel edge to {target}"),
                    });
                }
                predecessors[target].push(vertex);
            }
        }

        let mut covered = vec![0; n];
        for &vertex in colours.iter().flatten() {
            match covered.get_mut(vertex) {
                Some(count) => *count += 1,
                None => {
                    return Err(InvalidGraphError::MalformedColouring { vertex, count: 0 });
                }
            }
        }
        if let Some((vertex, &count)) = covered.iter().enumerate().find(|(_, &c)| c != 1) {
            return Err(InvalidGraphError::MalformedColouring { vertex, count });
        }

        Ok(Self {
            successors,
            predecessors,
            colours: colours.into_iter().filter(|c| !c.is_empty()).collect(),
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.successors.len()
    }

    /// Successors of `vertex`.
    #[inline]
    pub fn successors(&self, vertex: usize) -> &[usize] {
        &self.successors[vertex]
    }

    /// Predecessors of `vertex`.
    #[inline]
    pub fn predecessors(&self, vertex: usize) -> &[usize] {
        &self.predecessors[vertex]
    }

    /// The ordered colour partition, without empty classes.
    #[inline]
    pub fn colours(&self) -> &[Vec<usize>] {
        &self.colours
    }

    /// Iterates over all edges.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(s, succs)| succs.iter().map(move |&t| (s, t)))
    }

    /// Checks that `order` is a permutation of the vertices.
    pub(crate) fn check_permutation(&self, order: &[usize]) -> Result<(), OracleError> {
        let n = self.node_count();
        let mut seen = bitvec![0; n];
        let valid = order.len() == n && order.iter().all(|&v| v < n && !seen.replace(v, true));
        if valid {
            Ok(())
        } else {
            Err(OracleError::InvalidPermutation { n })
        }
    }

    /// Checks that `orbits` partition the vertices.
    pub(crate) fn check_orbits(&self, orbits: &[Vec<usize>]) -> Result<(), OracleError> {
        let n = self.node_count();
        let mut seen = bitvec![0; n];
        let mut count = 0;
        for &v in orbits.iter().flatten() {
            if v >= n || seen.replace(v, true) {
                return Err(OracleError::InvalidOrbits { n });
            }
            count += 1;
        }
        if count == n && orbits.iter().all(|o| !o.is_empty()) {
            Ok(())
        } else {
            Err(OracleError::InvalidOrbits { n })
        }
    }
}

/// A canonical labelling and automorphism group solver.
///
/// Implementations must be deterministic for a fixed input.
pub trait CanonicalOracle {
    /// Returns the vertices in canonical order.
    ///
    /// For any two isomorphic coloured digraphs, listing the colours and the
    /// relabelled edges in the returned orders must give identical results.
    fn canonical_label(&self, graph: &OracleGraph) -> Result<Vec<usize>, OracleError>;

    /// Returns the orbits of the automorphism group of the graph.
    ///
    /// Two vertices share an orbit iff some colour and edge preserving
    /// permutation maps one onto the other.
    fn automorphism_orbits(&self, graph: &OracleGraph) -> Result<Vec<Vec<usize>>, OracleError>;

    /// Returns both the canonical order and the orbits.
    ///
    /// Solvers computing both in a single pass should override this.
    fn analyze(&self, graph: &OracleGraph) -> Result<(Vec<usize>, Vec<Vec<usize>>), OracleError> {
        Ok((self.canonical_label(graph)?, self.automorphism_orbits(graph)?))
    }
}

/// Failure of a [`CanonicalOracle`] on a well-formed input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OracleError {
    /// The canonical order is not a permutation of the vertices.
    #[error("oracle returned an order that is not a permutation of 0..{n}")]
    InvalidPermutation { n: usize },
    /// The orbits do not partition the vertices.
    #[error("oracle returned orbits that do not partition 0..{n}")]
    InvalidOrbits { n: usize },
    /// The solver itself failed.
    #[error("automorphism solver failed: {message}")]
    Solver { message: String },
}

#[cfg(test)]
mod test {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn malformed_adjacency() {
        let err = OracleGraph::new(vec![smallvec![1], smallvec![2]], vec![vec![0, 1]]);
        assert!(matches!(
            err,
            Err(InvalidGraphError::MalformedAdjacency { vertex: 1, .. })
        ));

        let err = OracleGraph::new(vec![smallvec![1, 1], smallvec![]], vec![vec![0, 1]]);
        assert!(matches!(
            err,
            Err(InvalidGraphError::MalformedAdjacency { vertex: 0, .. })
        ));
    }

    #[test]
    fn malformed_colouring() {
        let succs = || vec![smallvec![1], smallvec![]];
        assert_eq!(
            OracleGraph::new(succs(), vec![vec![0]]),
            Err(InvalidGraphError::MalformedColouring {
                vertex: 1,
                count: 0
            })
        );
        assert_eq!(
            OracleGraph::new(succs(), vec![vec![0, 1], vec![1]]),
            Err(InvalidGraphError::MalformedColouring {
                vertex: 1,
                count: 2
            })
        );
        assert_eq!(
            OracleGraph::new(succs(), vec![vec![0, 1, 5]]),
            Err(InvalidGraphError::MalformedColouring {
                vertex: 5,
                count: 0
            })
        );
    }

    #[test]
    fn output_checks() {
        let graph = OracleGraph::new(vec![smallvec![1], smallvec![0]], vec![vec![0, 1]]).unwrap();
        assert_eq!(graph.predecessors(0), [1]);
        assert!(graph.check_permutation(&[1, 0]).is_ok());
        assert!(graph.check_permutation(&[1, 1]).is_err());
        assert!(graph.check_permutation(&[0]).is_err());
        assert!(graph.check_orbits(&[vec![0, 1]]).is_ok());
        assert!(graph.check_orbits(&[vec![0], vec![0, 1]]).is_err());
        assert!(graph.check_orbits(&[vec![0], vec![]]).is_err());
    }
}
