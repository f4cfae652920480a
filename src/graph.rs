//! Directed node-labelled multigraphs.
//!
//! [`LabelledGraph`] is the value every hasher in this crate consumes. Nodes
//! are identified by an opaque, ordered identifier and carry a string label.
//! Edges between an ordered pair of nodes are grouped in an [`EdgeBundle`],
//! which records how many edges carry each (optional) edge label, so the same
//! type represents plain digraphs, multigraphs and edge-labelled graphs.
//!
//! Graphs are treated as values: the hashing operations only ever read them,
//! and the transformations defined here return new graphs.

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::fmt::Debug;

use delegate::delegate;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::serialize::Term;

/// Requirements on node identifiers.
///
/// Identifiers are opaque to the hashers; the ordering is only used to make
/// iteration deterministic.
pub trait NodeId: Clone + Ord + Debug {}

impl<T: Clone + Ord + Debug> NodeId for T {}

/// The multiset of edges from one node to another.
///
/// Maps each edge label (`None` for unlabelled edges) to the number of
/// parallel edges carrying it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EdgeBundle {
    counts: BTreeMap<Option<String>, usize>,
}

impl EdgeBundle {
    /// A bundle with a single unlabelled edge.
    pub fn single() -> Self {
        Self::with_edges(None, 1)
    }

    /// A bundle with `count` parallel edges carrying `label`.
    pub fn with_edges(label: Option<String>, count: usize) -> Self {
        let mut bundle = Self::default();
        bundle.insert(label, count);
        bundle
    }

    /// Adds `count` edges carrying `label` to the bundle.
    pub fn insert(&mut self, label: Option<String>, count: usize) {
        if count > 0 {
            *self.counts.entry(label).or_default() += count;
        }
    }

    /// Adds all the edges of `other` to this bundle.
    pub fn merge(&mut self, other: &EdgeBundle) {
        for (label, &count) in other.iter() {
            self.insert(label.clone(), count);
        }
    }

    /// Total number of edges in the bundle.
    pub fn multiplicity(&self) -> usize {
        self.counts.values().sum()
    }

    /// Whether any edge in the bundle carries a label.
    pub fn is_labelled(&self) -> bool {
        self.counts.keys().any(Option::is_some)
    }

    /// Whether the bundle is a single unlabelled edge.
    pub fn is_simple(&self) -> bool {
        !self.is_labelled() && self.multiplicity() == 1
    }

    delegate! {
        to self.counts {
            /// Iterates over the distinct edge labels and their edge counts.
            pub fn iter(&self) -> btree_map::Iter<'_, Option<String>, usize>;
            /// Whether the bundle contains no edges.
            pub fn is_empty(&self) -> bool;
        }
    }

    /// The label a bundle is collapsed to when a multigraph is encoded as a
    /// graph with one labelled edge per node pair.
    ///
    /// Unlabelled bundles become their multiplicity, a single labelled edge
    /// becomes its quoted label, anything else becomes the sorted list of its
    /// entries. The three shapes render differently, so distinct bundles never
    /// share a key.
    pub fn key(&self) -> Term {
        if !self.is_labelled() {
            return Term::Int(self.multiplicity());
        }
        if self.counts.len() == 1 {
            if let Some((Some(label), 1)) = self.counts.iter().next() {
                return Term::str(label.as_str());
            }
        }
        Term::List(
            self.counts
                .iter()
                .map(|(label, &count)| match label {
                    None => Term::Int(count),
                    Some(label) => Term::from((label.as_str(), count)),
                })
                .collect(),
        )
    }
}

impl FromIterator<(Option<String>, usize)> for EdgeBundle {
    fn from_iter<I: IntoIterator<Item = (Option<String>, usize)>>(iter: I) -> Self {
        let mut bundle = Self::default();
        for (label, count) in iter {
            bundle.insert(label, count);
        }
        bundle
    }
}

#[cfg(feature = "serde")]
impl Serialize for EdgeBundle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.counts.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for EdgeBundle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<(Option<String>, usize)>::deserialize(deserializer).map(FromIterator::from_iter)
    }
}

/// A directed graph with string node labels, parallel edges, optional edge
/// labels and an optional graph-level label.
///
/// # Example
///
/// ```
/// # use dihash::LabelledGraph;
/// let mut graph = LabelledGraph::new();
/// graph.add_node(0, "a");
/// graph.add_node(1, "b");
/// graph.add_edge(0, 1).unwrap();
/// graph.add_edge(0, 1).unwrap();
/// assert_eq!(graph.edge_count(), 2);
/// assert!(graph.has_parallel_edges());
/// assert!(graph.add_edge(0, 2).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelledGraph<N> {
    /// Graph-level label.
    label: Option<String>,
    /// Node labels, by node.
    nodes: BTreeMap<N, String>,
    /// Outgoing edges of each node with at least one successor.
    edges: BTreeMap<N, BTreeMap<N, EdgeBundle>>,
}

impl<N> Default for LabelledGraph<N> {
    fn default() -> Self {
        Self {
            label: None,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }
}

impl<N: NodeId> LabelledGraph<N> {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a list of labelled nodes and unlabelled edges.
    ///
    /// Repeated edges become parallel edges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGraphError::DanglingEdge`] if an edge endpoint is not
    /// in the node list.
    pub fn from_edges(
        nodes: impl IntoIterator<Item = (N, impl Into<String>)>,
        edges: impl IntoIterator<Item = (N, N)>,
    ) -> Result<Self, InvalidGraphError> {
        let mut graph = Self::new();
        for (node, label) in nodes {
            graph.add_node(node, label);
        }
        for (from, to) in edges {
            graph.add_edge(from, to)?;
        }
        Ok(graph)
    }

    /// Sets the graph-level label, returning the graph.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The graph-level label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Replaces the graph-level label.
    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Adds a node, or relabels it if it is already present.
    ///
    /// Returns the previous label of the node, if any.
    pub fn add_node(&mut self, node: N, label: impl Into<String>) -> Option<String> {
        self.nodes.insert(node, label.into())
    }

    /// Adds an unlabelled edge. Adding the same edge twice creates two
    /// parallel edges.
    pub fn add_edge(&mut self, from: N, to: N) -> Result<(), InvalidGraphError> {
        self.add_edges(from, to, EdgeBundle::single())
    }

    /// Adds an edge carrying `label`.
    pub fn add_labelled_edge(
        &mut self,
        from: N,
        to: N,
        label: impl Into<String>,
    ) -> Result<(), InvalidGraphError> {
        self.add_edges(from, to, EdgeBundle::with_edges(Some(label.into()), 1))
    }

    /// Adds every edge of `bundle` between `from` and `to`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGraphError::DanglingEdge`] if either endpoint is not
    /// a node of the graph.
    pub fn add_edges(&mut self, from: N, to: N, bundle: EdgeBundle) -> Result<(), InvalidGraphError> {
        if !self.contains_node(&from) || !self.contains_node(&to) {
            return Err(InvalidGraphError::DanglingEdge {
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            });
        }
        self.insert_edges(from, to, bundle);
        Ok(())
    }

    /// Adds the edges of `bundle` without checking that the endpoints exist.
    pub(crate) fn insert_edges(&mut self, from: N, to: N, bundle: EdgeBundle) {
        debug_assert!(self.contains_node(&from) && self.contains_node(&to));
        if bundle.is_empty() {
            return;
        }
        self.edges
            .entry(from)
            .or_default()
            .entry(to)
            .or_default()
            .merge(&bundle);
    }

    /// Whether the graph contains `node`.
    pub fn contains_node(&self, node: &N) -> bool {
        self.nodes.contains_key(node)
    }

    /// The label of `node`.
    pub fn node_label(&self, node: &N) -> Option<&str> {
        self.nodes.get(node).map(String::as_str)
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges in the graph, counting parallel edges individually.
    pub fn edge_count(&self) -> usize {
        self.edges_iter().map(|(_, _, bundle)| bundle.multiplicity()).sum()
    }

    /// Iterates over the nodes in ascending order.
    pub fn nodes_iter(&self) -> impl Iterator<Item = &N> + '_ {
        self.nodes.keys()
    }

    /// Iterates over the nodes and their labels in ascending node order.
    pub fn labelled_nodes(&self) -> impl Iterator<Item = (&N, &str)> + '_ {
        self.nodes.iter().map(|(n, label)| (n, label.as_str()))
    }

    /// Iterates over the distinct successors of `node` and the edges leading
    /// to each of them.
    pub fn successors<'a>(&'a self, node: &N) -> impl Iterator<Item = (&'a N, &'a EdgeBundle)> + 'a {
        self.edges.get(node).into_iter().flatten()
    }

    /// Iterates over all node pairs connected by at least one edge.
    pub fn edges_iter(&self) -> impl Iterator<Item = (&N, &N, &EdgeBundle)> + '_ {
        self.edges
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |(to, bundle)| (from, to, bundle)))
    }

    /// Whether some node pair is connected by more than one edge.
    pub fn has_parallel_edges(&self) -> bool {
        self.edges_iter().any(|(_, _, bundle)| bundle.multiplicity() > 1)
    }

    /// Whether any edge carries a label.
    pub fn has_edge_labels(&self) -> bool {
        self.edges_iter().any(|(_, _, bundle)| bundle.is_labelled())
    }

    /// Whether the graph is a plain node-labelled digraph, i.e. it has no
    /// parallel edges and no edge labels.
    pub fn is_simple(&self) -> bool {
        self.edges_iter().all(|(_, _, bundle)| bundle.is_simple())
    }

    /// Returns a copy of the graph with every node label replaced by
    /// `relabel(node, label)`.
    pub fn relabel_nodes(&self, mut relabel: impl FnMut(&N, &str) -> String) -> Self {
        Self {
            label: self.label.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|(n, label)| (n.clone(), relabel(n, label)))
                .collect(),
            edges: self.edges.clone(),
        }
    }

    /// Returns the subgraph induced by `members`, without the graph-level
    /// label. Members missing from the graph are ignored.
    pub fn induced_subgraph(&self, members: &BTreeSet<N>) -> Self {
        let nodes = self
            .nodes
            .iter()
            .filter(|(n, _)| members.contains(*n))
            .map(|(n, label)| (n.clone(), label.clone()))
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|(from, _)| members.contains(*from))
            .filter_map(|(from, targets)| {
                let targets: BTreeMap<_, _> = targets
                    .iter()
                    .filter(|(to, _)| members.contains(*to))
                    .map(|(to, bundle)| (to.clone(), bundle.clone()))
                    .collect();
                (!targets.is_empty()).then(|| (from.clone(), targets))
            })
            .collect();
        Self {
            label: None,
            nodes,
            edges,
        }
    }
}

/// Serialized form of a [`LabelledGraph`], as flat node and edge lists.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct SerGraph<N> {
    label: Option<String>,
    nodes: Vec<(N, String)>,
    edges: Vec<(N, N, EdgeBundle)>,
}

#[cfg(feature = "serde")]
impl<N: NodeId + Serialize> Serialize for LabelledGraph<N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SerGraph {
            label: self.label.clone(),
            nodes: self
                .labelled_nodes()
                .map(|(n, label)| (n.clone(), label.to_string()))
                .collect(),
            edges: self
                .edges_iter()
                .map(|(from, to, bundle)| (from.clone(), to.clone(), bundle.clone()))
                .collect(),
        }
        .serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, N: NodeId + Deserialize<'de>> Deserialize<'de> for LabelledGraph<N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ser = SerGraph::<N>::deserialize(deserializer)?;
        let mut graph = Self::new();
        graph.label = ser.label;
        for (node, label) in ser.nodes {
            graph.add_node(node, label);
        }
        for (from, to, bundle) in ser.edges {
            graph
                .add_edges(from, to, bundle)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(graph)
    }
}

/// Error returned when a graph, or its index-based form at the oracle
/// boundary, is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum InvalidGraphError {
    /// An edge refers to a node missing from the graph.
    #[error("edge {from} -> {to} has an endpoint missing from the graph")]
    DanglingEdge { from: String, to: String },
    /// A requested node is missing from the graph.
    #[error("unknown node {node}")]
    UnknownNode { node: String },
    /// The graph has parallel edges or edge labels where a plain digraph is
    /// required.
    #[error("expected a plain digraph, found parallel or labelled edges")]
    NotSimple,
    /// The colour classes do not partition the vertex indices exactly once.
    #[error("vertex {vertex} is covered by {count} colour classes, expected exactly one")]
    MalformedColouring { vertex: usize, count: usize },
    /// The adjacency lists reference vertices out of range or repeat an edge.
    #[error("malformed adjacency for vertex {vertex}: {reason}")]
    MalformedAdjacency { vertex: usize, reason: String },
}

#[cfg(test)]
mod test {
    use super::*;
    use insta::assert_snapshot;
    use rstest::{fixture, rstest};

    /// ```text
    /// 0 -> 1 => 2
    /// ^         |
    /// +---------+
    /// ```
    /// with a double edge between 1 and 2 and a labelled edge 2 -> 0.
    #[fixture]
    fn graph() -> LabelledGraph<usize> {
        let mut graph = LabelledGraph::from_edges(
            [(0, "a"), (1, "b"), (2, "b")],
            [(0, 1), (1, 2), (1, 2)],
        )
        .unwrap();
        graph.add_labelled_edge(2, 0, "back").unwrap();
        graph
    }

    #[rstest]
    fn counts(graph: LabelledGraph<usize>) {
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.has_parallel_edges());
        assert!(graph.has_edge_labels());
        assert!(!graph.is_simple());
        assert_eq!(graph.successors(&1).count(), 1);
        assert_eq!(graph.successors(&7).count(), 0);
    }

    #[rstest]
    fn dangling_edges(mut graph: LabelledGraph<usize>) {
        assert_eq!(
            graph.add_edge(0, 3),
            Err(InvalidGraphError::DanglingEdge {
                from: "0".to_string(),
                to: "3".to_string()
            })
        );
        assert_eq!(graph.edge_count(), 4);
    }

    #[rstest]
    fn induced_subgraph(graph: LabelledGraph<usize>) {
        let sub = graph
            .with_label("whole")
            .induced_subgraph(&BTreeSet::from([1, 2]));
        assert_eq!(sub.node_count(), 2);
        assert_eq!(sub.edge_count(), 2);
        assert_eq!(sub.label(), None);
        assert!(sub.has_parallel_edges());
        assert!(!sub.has_edge_labels());
    }

    #[rstest]
    fn relabelling_copies(graph: LabelledGraph<usize>) {
        let relabelled = graph.relabel_nodes(|n, label| format!("{label}{n}"));
        assert_eq!(relabelled.node_label(&2), Some("b2"));
        assert_eq!(graph.node_label(&2), Some("b"));
        assert_eq!(relabelled.edge_count(), graph.edge_count());
    }

    #[test]
    fn bundle_keys() {
        assert_snapshot!(EdgeBundle::single().key().to_string(), @"1");
        assert_snapshot!(EdgeBundle::with_edges(None, 3).key().to_string(), @"3");
        assert_snapshot!(
            EdgeBundle::with_edges(Some("3".into()), 1).key().to_string(),
            @r#""3""#
        );
        let mut mixed = EdgeBundle::with_edges(Some("x".into()), 2);
        mixed.insert(None, 1);
        assert_snapshot!(mixed.key().to_string(), @r#"[1,("x",2)]"#);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn serde_roundtrip(graph: LabelledGraph<usize>) {
        let graph = graph.with_label("g");
        let json = serde_json::to_string(&graph).unwrap();
        assert_eq!(serde_json::from_str::<LabelledGraph<usize>>(&json).unwrap(), graph);

        let packed = rmp_serde::to_vec(&graph).unwrap();
        assert_eq!(rmp_serde::from_slice::<LabelledGraph<usize>>(&packed).unwrap(), graph);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializing_dangling_edges_fails() {
        let json = r#"{"label":null,"nodes":[[0,"a"]],"edges":[[0,1,[[null,1]]]]}"#;
        assert!(serde_json::from_str::<LabelledGraph<usize>>(json).is_err());
    }

    #[test]
    fn bundles_from_entries() {
        let bundle: EdgeBundle = [(None, 2), (Some("x".to_string()), 1), (None, 0)]
            .into_iter()
            .collect();
        assert_eq!(bundle.multiplicity(), 3);
        assert_eq!(bundle.iter().count(), 2);
    }

    #[test]
    fn empty_bundles_add_nothing() {
        let mut graph = LabelledGraph::from_edges([(0, "a")], []).unwrap();
        graph.add_edges(0, 0, EdgeBundle::default()).unwrap();
        assert_eq!(graph.edges_iter().count(), 0);
        assert!(graph.is_simple());
    }
}
