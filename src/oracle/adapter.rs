//! Translation between [`LabelledGraph`] and [`OracleGraph`].

use std::collections::BTreeMap;

use crate::graph::{InvalidGraphError, LabelledGraph, NodeId};
use crate::oracle::{CanonicalOracle, OracleError, OracleGraph, Successors};
use crate::serialize::Term;
use crate::HashError;

/// A plain [`LabelledGraph`] indexed for an oracle.
///
/// Nodes are numbered `0..n` in ascending order and coloured by a caller
/// supplied function of the node and its label. Colour classes are passed to
/// the oracle sorted by colour, so the partition order does not depend on the
/// node identifiers.
#[derive(Clone, Debug)]
pub struct IndexedGraph<'g, N> {
    nodes: Vec<&'g N>,
    index: BTreeMap<&'g N, usize>,
    colours: Vec<Term>,
    graph: OracleGraph,
}

impl<'g, N: NodeId> IndexedGraph<'g, N> {
    /// Indexes `graph`, colouring each node with `colour(node, label)`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGraphError::NotSimple`] if the graph has parallel or
    /// labelled edges, which oracles cannot represent.
    pub fn new(
        graph: &'g LabelledGraph<N>,
        colour: impl Fn(&N, &str) -> Term,
    ) -> Result<Self, InvalidGraphError> {
        if !graph.is_simple() {
            return Err(InvalidGraphError::NotSimple);
        }
        let nodes: Vec<&N> = graph.nodes_iter().collect();
        let index: BTreeMap<&N, usize> = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let successors = nodes
            .iter()
            .map(|&n| graph.successors(n).map(|(t, _)| index[t]).collect::<Successors>())
            .collect();

        let colours: Vec<Term> = graph
            .labelled_nodes()
            .map(|(n, label)| colour(n, label))
            .collect();
        let mut classes: BTreeMap<&Term, Vec<usize>> = BTreeMap::new();
        for (i, c) in colours.iter().enumerate() {
            classes.entry(c).or_default().push(i);
        }
        let classes = classes.into_values().collect();

        let graph = OracleGraph::new(successors, classes)?;
        Ok(Self {
            nodes,
            index,
            colours,
            graph,
        })
    }

    /// Indexes a graph coloured by its node labels.
    pub fn with_labels(graph: &'g LabelledGraph<N>) -> Result<Self, InvalidGraphError> {
        Self::new(graph, |_, label| Term::str(label))
    }

    /// The index-based graph handed to the oracle.
    pub fn oracle_graph(&self) -> &OracleGraph {
        &self.graph
    }

    /// The node at `index`.
    pub fn node(&self, index: usize) -> &'g N {
        self.nodes[index]
    }

    /// The index of `node`, if it belongs to the graph.
    pub fn index_of(&self, node: &N) -> Option<usize> {
        self.index.get(node).copied()
    }

    /// The colour of the node at `index`.
    pub fn colour(&self, index: usize) -> &Term {
        &self.colours[index]
    }

    /// Canonical order of the node indices, validated.
    pub fn canonical_order(&self, oracle: &(impl CanonicalOracle + ?Sized)) -> Result<Vec<usize>, OracleError> {
        let order = oracle.canonical_label(&self.graph)?;
        self.graph.check_permutation(&order)?;
        Ok(order)
    }

    /// Canonical order and automorphism orbits of the node indices, validated.
    pub fn analyze(
        &self,
        oracle: &(impl CanonicalOracle + ?Sized),
    ) -> Result<(Vec<usize>, Vec<Vec<usize>>), OracleError> {
        let (order, orbits) = oracle.analyze(&self.graph)?;
        self.graph.check_permutation(&order)?;
        self.graph.check_orbits(&orbits)?;
        Ok((order, orbits))
    }

    /// Automorphism orbits as sets of nodes, each sorted, listed in order of
    /// their least member.
    pub fn orbits(&self, oracle: &(impl CanonicalOracle + ?Sized)) -> Result<Vec<Vec<&'g N>>, OracleError> {
        let orbits = oracle.automorphism_orbits(&self.graph)?;
        self.graph.check_orbits(&orbits)?;
        let mut orbits: Vec<Vec<&N>> = orbits
            .into_iter()
            .map(|orbit| {
                let mut orbit: Vec<&N> = orbit.into_iter().map(|i| self.nodes[i]).collect();
                orbit.sort();
                orbit
            })
            .collect();
        orbits.sort();
        Ok(orbits)
    }

    /// The colours listed in `order`, and the edges relabelled by position
    /// in `order`, sorted.
    pub fn relabel(&self, order: &[usize]) -> (Vec<&Term>, Vec<(usize, usize)>) {
        let mut position = vec![0; order.len()];
        for (pos, &i) in order.iter().enumerate() {
            position[i] = pos;
        }
        let colours = order.iter().map(|&i| &self.colours[i]).collect();
        let mut edges: Vec<_> = self
            .graph
            .edges()
            .map(|(s, t)| (position[s], position[t]))
            .collect();
        edges.sort_unstable();
        (colours, edges)
    }

    /// A complete isomorphism invariant of the coloured graph: its colours
    /// and edges listed in canonical order.
    pub fn certificate(
        &self,
        oracle: &(impl CanonicalOracle + ?Sized),
    ) -> Result<(Vec<Term>, Vec<(usize, usize)>), OracleError> {
        let order = self.canonical_order(oracle)?;
        let (colours, edges) = self.relabel(&order);
        Ok((colours.into_iter().cloned().collect(), edges))
    }
}

/// Returns the nodes of a plain labelled graph in canonical order, together
/// with its automorphism orbits.
///
/// # Example
///
/// ```
/// # use dihash::{oracle::{analyze_graph, RefinementOracle}, LabelledGraph};
/// let graph = LabelledGraph::from_edges(
///     [("x", "a"), ("y", "b"), ("z", "b")],
///     [("x", "y"), ("x", "z")],
/// ).unwrap();
/// let (order, orbits) = analyze_graph(&graph, &RefinementOracle::new()).unwrap();
/// assert_eq!(order[0], "x");
/// assert_eq!(orbits, vec![vec!["x"], vec!["y", "z"]]);
/// ```
pub fn analyze_graph<N: NodeId>(
    graph: &LabelledGraph<N>,
    oracle: &(impl CanonicalOracle + ?Sized),
) -> Result<(Vec<N>, Vec<Vec<N>>), HashError> {
    let indexed = IndexedGraph::with_labels(graph)?;
    let order = indexed
        .canonical_order(oracle)?
        .into_iter()
        .map(|i| indexed.node(i).clone())
        .collect();
    let orbits = indexed
        .orbits(oracle)?
        .into_iter()
        .map(|orbit| orbit.into_iter().cloned().collect())
        .collect();
    Ok((order, orbits))
}
