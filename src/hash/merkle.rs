//! Merkle-style hashing of possibly cyclic graphs.
//!
//! The graph is split into strongly connected components. Each component is
//! hashed after every component it points to: the label of each node is first
//! *sealed* with the hashes of the nodes it reaches outside its component,
//! then the subgraph induced by the component is hashed as a whole. The hash
//! of a node therefore only depends on the part of the graph reachable from
//! it, so shared substructures hash identically wherever they appear, and
//! node hashes from earlier calls can be reused as a cache.

use std::collections::{BTreeMap, BTreeSet};

use crate::algorithms::{postorder_filtered, Condensation};
use crate::graph::{InvalidGraphError, LabelledGraph, NodeId};
use crate::oracle::CanonicalOracle;
use crate::serialize::Term;
use crate::HashError;

use super::{GraphHasher, HashFunction, HashOptions};

/// Output of a Merkle hash.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "N: serde::Serialize",
        deserialize = "N: serde::Deserialize<'de> + Ord"
    ))
)]
pub struct MerkleHashes<N> {
    /// Hash of every component hashed by this call, by component index.
    pub scc_hashes: BTreeMap<usize, String>,
    /// The strongly connected components of the graph.
    pub condensation: Condensation<N>,
    /// Hashes of the nodes, including the precomputed ones.
    ///
    /// Can be passed back as the precomputed hashes of a later call on a
    /// graph sharing the same reachable substructures.
    pub node_hashes: BTreeMap<N, String>,
}

pub(super) fn merkle_hash_graph<H, O, N>(
    hasher: &GraphHasher<H, O>,
    graph: &LabelledGraph<N>,
    nodes_to_hash: Option<&[N]>,
    apply_quotient: bool,
    precomputed_hashes: Option<&BTreeMap<N, String>>,
) -> Result<MerkleHashes<N>, HashError>
where
    H: HashFunction,
    O: CanonicalOracle,
    N: NodeId,
{
    let condensation = Condensation::new(graph);
    let precomputed = precomputed_hashes.cloned().unwrap_or_default();

    let roots: BTreeSet<usize> = match nodes_to_hash {
        Some(nodes) => nodes
            .iter()
            .map(|n| {
                condensation
                    .component_of(n)
                    .ok_or_else(|| InvalidGraphError::UnknownNode {
                        node: format!("{n:?}"),
                    })
            })
            .collect::<Result<_, _>>()?,
        None => condensation.sources().collect(),
    };

    // A component is a dependency of another if it contains one of its
    // external successors lacking a hash.
    let needs = |from: usize, to: usize| {
        condensation
            .members(from)
            .iter()
            .flat_map(|s| graph.successors(s))
            .any(|(t, _)| condensation.component_of(t) == Some(to) && !precomputed.contains_key(t))
    };

    let options = HashOptions::new()
        .hash_nodes(true)
        .apply_quotient(apply_quotient);
    let mut node_hashes = precomputed.clone();
    let mut scc_hashes = BTreeMap::new();
    for component in postorder_filtered(&condensation, roots, needs) {
        let members: BTreeSet<N> = condensation.members(component).iter().cloned().collect();
        let sealed = seal(hasher, graph, &members, &node_hashes)?;
        let digest = hasher.hash_graph(&sealed, options)?;
        tracing::debug!(
            component,
            members = members.len(),
            scc_hash = %digest.graph_hash,
            "hashed component"
        );
        scc_hashes.insert(component, digest.graph_hash);
        node_hashes.extend(digest.node_hashes.unwrap_or_default());
    }

    Ok(MerkleHashes {
        scc_hashes,
        condensation,
        node_hashes,
    })
}

/// The subgraph induced by `members`, with each node label sealed with the
/// hashes of its successors outside of `members`.
fn seal<H, O, N>(
    hasher: &GraphHasher<H, O>,
    graph: &LabelledGraph<N>,
    members: &BTreeSet<N>,
    node_hashes: &BTreeMap<N, String>,
) -> Result<LabelledGraph<N>, HashError>
where
    H: HashFunction,
    O: CanonicalOracle,
    N: NodeId,
{
    let mut sealed_labels = BTreeMap::new();
    for s in members {
        let label = graph
            .node_label(s)
            .ok_or_else(|| InvalidGraphError::UnknownNode {
                node: format!("{s:?}"),
            })?;
        let mut external: Vec<Term> = graph
            .successors(s)
            .filter(|(t, _)| !members.contains(*t))
            .map(|(t, _)| Term::str(&node_hashes[t]))
            .collect();
        external.sort();
        let sealed = hasher.hash_terms(&[Term::str(label), Term::List(external)])?;
        sealed_labels.insert(s, sealed);
    }
    Ok(graph
        .induced_subgraph(members)
        .relabel_nodes(|n, _| sealed_labels[n].clone()))
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use super::*;
    use crate::hash::Sha256Hex;
    use rstest::{fixture, rstest};

    /// Two parents, each pointing at its own copy of a labelled 2-cycle
    /// feeding one leaf, below a common root:
    ///
    /// ```text
    ///        root
    ///       /    \
    ///      p      q
    ///      |      |
    ///     a1<->b1 a2<->b2
    ///           |       |
    ///           l1      l2
    /// ```
    #[fixture]
    fn shared() -> LabelledGraph<&'static str> {
        LabelledGraph::from_edges(
            [
                ("root", "r"),
                ("p", "parent"),
                ("q", "parent"),
                ("a1", "a"),
                ("b1", "b"),
                ("a2", "a"),
                ("b2", "b"),
                ("l1", "leaf"),
                ("l2", "leaf"),
            ],
            [
                ("root", "p"),
                ("root", "q"),
                ("p", "a1"),
                ("q", "a2"),
                ("a1", "b1"),
                ("b1", "a1"),
                ("a2", "b2"),
                ("b2", "a2"),
                ("b1", "l1"),
                ("b2", "l2"),
            ],
        )
        .unwrap()
    }

    /// The left branch of [`shared`] on its own.
    #[fixture]
    fn branch() -> LabelledGraph<&'static str> {
        LabelledGraph::from_edges(
            [("p", "parent"), ("a1", "a"), ("b1", "b"), ("l1", "leaf")],
            [("p", "a1"), ("a1", "b1"), ("b1", "a1"), ("b1", "l1")],
        )
        .unwrap()
    }

    #[rstest]
    fn shared_cyclic_substructure(shared: LabelledGraph<&'static str>, branch: LabelledGraph<&'static str>) {
        let hasher = GraphHasher::new();
        let full = hasher.merkle_hash_graph(&shared, None, false, None).unwrap();
        let h = &full.node_hashes;
        assert_eq!(h.len(), 9);
        assert_eq!(h["l1"], h["l2"]);
        assert_eq!(h["a1"], h["a2"]);
        assert_eq!(h["b1"], h["b2"]);
        assert_eq!(h["p"], h["q"]);
        assert_ne!(h["a1"], h["b1"]);
        assert_eq!(full.scc_hashes.len(), full.condensation.component_count());

        let c = |n| full.condensation.component_of(&n).unwrap();
        assert_eq!(c("a1"), c("b1"));
        assert_eq!(full.scc_hashes[&c("a1")], full.scc_hashes[&c("a2")]);

        // Hashes only depend on the reachable part of the graph.
        let part = hasher.merkle_hash_graph(&branch, None, false, None).unwrap();
        for n in ["p", "a1", "b1", "l1"] {
            assert_eq!(part.node_hashes[n], h[n]);
        }
        assert_ne!(h["root"], h["p"]);
    }

    #[rstest]
    fn external_successors_are_sealed(branch: LabelledGraph<&'static str>) {
        let hasher = GraphHasher::new();
        let sealed = hasher.merkle_hash_graph(&branch, None, false, None).unwrap();
        let bare = LabelledGraph::from_edges(
            [("p", "parent"), ("a1", "a"), ("b1", "b")],
            [("p", "a1"), ("a1", "b1"), ("b1", "a1")],
        )
        .unwrap();
        let bare = hasher.merkle_hash_graph(&bare, None, false, None).unwrap();
        for n in ["p", "a1", "b1"] {
            assert_ne!(sealed.node_hashes[n], bare.node_hashes[n]);
        }

        let c = |n| sealed.condensation.component_of(&n).unwrap();
        assert_eq!(sealed.condensation.members(c("a1")), ["a1", "b1"]);
        assert_eq!(sealed.condensation.successors(c("a1")), [c("l1")]);
    }

    #[rstest]
    fn precomputed_hashes_are_reused(shared: LabelledGraph<&'static str>, branch: LabelledGraph<&'static str>) {
        let calls = Cell::new(0);
        let counting = |s: &str| {
            calls.set(calls.get() + 1);
            Sha256Hex.hash_str(s).unwrap_or_default()
        };
        let hasher = GraphHasher::new().with_hash_fn(&counting);
        let full = hasher.merkle_hash_graph(&shared, None, false, None).unwrap();
        let cold_calls = calls.replace(0);

        let cache = hasher
            .merkle_hash_graph(&branch, None, false, None)
            .unwrap()
            .node_hashes;
        calls.set(0);
        let warm = hasher
            .merkle_hash_graph(&shared, None, false, Some(&cache))
            .unwrap();
        assert_eq!(warm.node_hashes, full.node_hashes);
        assert!(calls.get() < cold_calls);
        // The cached branch is not hashed again.
        let c = |n| warm.condensation.component_of(&n).unwrap();
        assert!(!warm.scc_hashes.contains_key(&c("a1")));
        assert!(!warm.scc_hashes.contains_key(&c("p")));
        assert!(!warm.scc_hashes.contains_key(&c("l1")));
        assert!(warm.scc_hashes.contains_key(&c("a2")));
        assert!(warm.scc_hashes.contains_key(&c("l2")));
    }

    #[rstest]
    fn selected_roots(shared: LabelledGraph<&'static str>) {
        let hasher = GraphHasher::new();
        let full = hasher.merkle_hash_graph(&shared, None, false, None).unwrap();
        let partial = hasher
            .merkle_hash_graph(&shared, Some(&["q"][..]), false, None)
            .unwrap();
        assert_eq!(
            partial.node_hashes.keys().copied().collect::<Vec<_>>(),
            ["a2", "b2", "l2", "q"]
        );
        for (n, hash) in &partial.node_hashes {
            assert_eq!(hash, &full.node_hashes[n]);
        }
        assert_eq!(partial.scc_hashes.len(), 3);
    }

    #[rstest]
    fn quotient_folds_cycle_lengths(branch: LabelledGraph<&'static str>) {
        let hasher = GraphHasher::new();
        // A parent above a ring whose nodes all feed one sink.
        let ring = |n: usize| {
            let mut graph = LabelledGraph::from_edges(
                [(0, "parent"), (n + 1, "sink")]
                    .into_iter()
                    .chain((1..=n).map(|i| (i, "a"))),
                (1..=n).flat_map(|i| [(i, i % n + 1), (i, n + 1)]),
            )
            .unwrap();
            graph.add_edge(0, 1).unwrap();
            graph
        };
        let h2 = hasher.merkle_hash_graph(&ring(2), None, true, None).unwrap();
        let h5 = hasher.merkle_hash_graph(&ring(5), None, true, None).unwrap();
        assert_eq!(h2.node_hashes[&0], h5.node_hashes[&0]);
        assert_eq!(h2.node_hashes[&1], h5.node_hashes[&3]);
        assert_eq!(h2.node_hashes[&3], h5.node_hashes[&6]);
        assert_eq!(h2.condensation.component_count(), 3);

        let plain = hasher.merkle_hash_graph(&branch, None, false, None).unwrap();
        let quotiented = hasher.merkle_hash_graph(&branch, None, true, None).unwrap();
        assert_eq!(plain.node_hashes.len(), quotiented.node_hashes.len());
    }

    #[rstest]
    fn unknown_root(shared: LabelledGraph<&'static str>) {
        let err = GraphHasher::new()
            .merkle_hash_graph(&shared, Some(&["root", "nope"][..]), false, None)
            .unwrap_err();
        assert_eq!(
            err,
            HashError::InvalidGraph(InvalidGraphError::UnknownNode {
                node: "\"nope\"".to_string()
            })
        );
    }

    #[rstest]
    fn sealing_unknown_members(branch: LabelledGraph<&'static str>) {
        let members = BTreeSet::from(["ghost", "l1"]);
        let err = seal(&GraphHasher::new(), &branch, &members, &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            HashError::InvalidGraph(InvalidGraphError::UnknownNode {
                node: "\"ghost\"".to_string()
            })
        );
    }

    #[test]
    fn acyclic_chain() {
        let graph = LabelledGraph::from_edges([(0, "x"), (1, "x"), (2, "x")], [(0, 1), (1, 2)]).unwrap();
        let merkle = GraphHasher::new().merkle_hash_graph(&graph, None, false, None).unwrap();
        assert_eq!(merkle.condensation.component_count(), 3);
        assert_eq!(merkle.node_hashes.values().collect::<BTreeSet<_>>().len(), 3);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn cache_roundtrip(shared: LabelledGraph<&'static str>) {
        let merkle = GraphHasher::new().merkle_hash_graph(&shared, None, false, None).unwrap();
        let owned: BTreeMap<String, String> = merkle
            .node_hashes
            .iter()
            .map(|(n, h)| (n.to_string(), h.clone()))
            .collect();

        let json = serde_json::to_string(&owned).unwrap();
        let back: BTreeMap<String, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, owned);

        let packed = rmp_serde::to_vec(&merkle).unwrap();
        let unpacked: MerkleHashes<String> = rmp_serde::from_slice(&packed).unwrap();
        assert_eq!(unpacked.node_hashes, owned);
        assert_eq!(unpacked.scc_hashes, merkle.scc_hashes);
    }
}
