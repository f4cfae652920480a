//! Hashing the structural role of a set of nodes.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{InvalidGraphError, LabelledGraph, NodeId};
use crate::oracle::CanonicalOracle;
use crate::serialize::Term;
use crate::HashError;

use super::{GraphHasher, HashFunction, HashOptions};

/// Hash of a graph with a marked node set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSetDigest<N> {
    /// Hash of the marked graph.
    pub graph_hash: String,
    /// Hashes of the members of the set in the marked graph.
    pub node_hashes: BTreeMap<N, String>,
}

/// Sets smaller than this are hashed without marking.
const MIN_MARKED: usize = 2;

pub(super) fn hash_graph_node_set<H, O, N>(
    hasher: &GraphHasher<H, O>,
    graph: &LabelledGraph<N>,
    node_set: &BTreeSet<N>,
    apply_quotient: bool,
) -> Result<NodeSetDigest<N>, HashError>
where
    H: HashFunction,
    O: CanonicalOracle,
    N: NodeId,
{
    if let Some(unknown) = node_set.iter().find(|n| !graph.contains_node(n)) {
        return Err(InvalidGraphError::UnknownNode {
            node: format!("{unknown:?}"),
        }
        .into());
    }

    let options = HashOptions::new()
        .hash_nodes(true)
        .apply_quotient(apply_quotient);
    let digest = if node_set.len() >= MIN_MARKED {
        let marked = graph.relabel_nodes(|n, label| {
            let mark = if node_set.contains(n) { "ptr" } else { "nonptr" };
            Term::from((mark, label)).to_string()
        });
        hasher.hash_graph(&marked, options)?
    } else {
        hasher.hash_graph(graph, options)?
    };

    let mut node_hashes = digest.node_hashes.unwrap_or_default();
    node_hashes.retain(|n, _| node_set.contains(n));
    Ok(NodeSetDigest {
        graph_hash: digest.graph_hash,
        node_hashes,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn square() -> LabelledGraph<usize> {
        LabelledGraph::from_edges((1..=4).map(|i| (i, "x")), [(1, 2), (2, 3), (3, 4), (4, 1)]).unwrap()
    }

    fn digest(graph: &LabelledGraph<usize>, set: impl IntoIterator<Item = usize>) -> NodeSetDigest<usize> {
        GraphHasher::new()
            .hash_graph_node_set(graph, &set.into_iter().collect(), false)
            .unwrap()
    }

    #[rstest]
    fn opposite_corners(square: LabelledGraph<usize>) {
        let odd = digest(&square, [1, 3]);
        let even = digest(&square, [2, 4]);
        assert_eq!(odd.graph_hash, even.graph_hash);
        assert_eq!(odd.node_hashes.len(), 2);
        assert_eq!(odd.node_hashes[&1], even.node_hashes[&2]);
        assert_eq!(odd.node_hashes[&1], odd.node_hashes[&3]);

        let adjacent = digest(&square, [1, 2]);
        assert_ne!(odd.graph_hash, adjacent.graph_hash);
        assert_ne!(adjacent.node_hashes[&1], adjacent.node_hashes[&2]);
        assert_eq!(adjacent.graph_hash, digest(&square, [3, 4]).graph_hash);
    }

    #[rstest]
    fn small_sets_are_not_marked(square: LabelledGraph<usize>) {
        let plain = GraphHasher::new()
            .hash_graph(&square, HashOptions::new().hash_nodes(true))
            .unwrap();
        for set in [vec![], vec![2]] {
            let set_digest = digest(&square, set.clone());
            assert_eq!(set_digest.graph_hash, plain.graph_hash);
            assert_eq!(set_digest.node_hashes.len(), set.len());
        }
        assert_eq!(digest(&square, [2]).node_hashes[&2], plain.node_hashes.unwrap()[&2]);
    }

    #[rstest]
    fn quotient_folds_rotations(square: LabelledGraph<usize>) {
        let hasher = GraphHasher::new();
        let set = BTreeSet::from([1, 3]);
        let square_digest = hasher.hash_graph_node_set(&square, &set, true).unwrap();

        // Alternating marks on a 2-cycle collapse to the same quotient.
        let pair = LabelledGraph::from_edges([(1, "x"), (2, "x")], [(1, 2), (2, 1)]).unwrap();
        let pair_digest = hasher
            .hash_graph_node_set(&pair, &BTreeSet::from([1, 2]), true)
            .unwrap();
        assert_ne!(square_digest.graph_hash, pair_digest.graph_hash);

        let hexagon = LabelledGraph::from_edges((1..=6).map(|i| (i, "x")), (1..=6).map(|i| (i, i % 6 + 1))).unwrap();
        let hexagon_digest = hasher
            .hash_graph_node_set(&hexagon, &BTreeSet::from([1, 3, 5]), true)
            .unwrap();
        assert_eq!(square_digest.graph_hash, hexagon_digest.graph_hash);
        assert_eq!(square_digest.node_hashes[&1], hexagon_digest.node_hashes[&5]);
    }

    #[rstest]
    fn unknown_members(square: LabelledGraph<usize>) {
        let err = GraphHasher::new()
            .hash_graph_node_set(&square, &BTreeSet::from([1, 9]), false)
            .unwrap_err();
        assert_eq!(
            err,
            HashError::InvalidGraph(InvalidGraphError::UnknownNode {
                node: "9".to_string()
            })
        );
    }
}
