use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::graph::{LabelledGraph, NodeId};

/// The condensation of a graph: its strongly connected components and the
/// acyclic graph of edges between them.
///
/// Components are numbered in topological order, so every edge between two
/// components goes from a lower to a higher number. Each component lists its
/// members in ascending order.
///
/// # Example
///
/// ```
/// # use dihash::{algorithms::Condensation, LabelledGraph};
/// let graph = LabelledGraph::from_edges(
///     [(0, "a"), (1, "b"), (2, "c")],
///     [(0, 1), (1, 2), (2, 1)],
/// ).unwrap();
/// let condensation = Condensation::new(&graph);
/// assert_eq!(condensation.component_count(), 2);
/// assert_eq!(condensation.members(1), [1, 2]);
/// assert_eq!(condensation.successors(0), [1]);
/// assert_eq!(condensation.sources().collect::<Vec<_>>(), [0]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound(
        serialize = "N: serde::Serialize",
        deserialize = "N: serde::Deserialize<'de> + Ord"
    ))
)]
pub struct Condensation<N> {
    members: Vec<Vec<N>>,
    component_of: BTreeMap<N, usize>,
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl<N: NodeId> Condensation<N> {
    /// Computes the condensation of `graph` with Tarjan's algorithm.
    pub fn new(graph: &LabelledGraph<N>) -> Self {
        let nodes: Vec<&N> = graph.nodes_iter().collect();
        let mut digraph: DiGraph<(), ()> = DiGraph::with_capacity(nodes.len(), 0);
        let index: BTreeMap<&N, NodeIndex> = nodes.iter().map(|&n| (n, digraph.add_node(()))).collect();
        for (from, to, _) in graph.edges_iter() {
            digraph.add_edge(index[from], index[to], ());
        }

        // Tarjan's algorithm emits the components in reverse topological order.
        let mut sccs = tarjan_scc(&digraph);
        sccs.reverse();

        let members: Vec<Vec<N>> = sccs
            .into_iter()
            .map(|scc| {
                let mut scc: Vec<N> = scc.into_iter().map(|i| nodes[i.index()].clone()).collect();
                scc.sort();
                scc
            })
            .collect();
        let component_of: BTreeMap<N, usize> = members
            .iter()
            .enumerate()
            .flat_map(|(c, scc)| scc.iter().map(move |n| (n.clone(), c)))
            .collect();

        let mut successors = vec![BTreeSet::new(); members.len()];
        for (from, to, _) in graph.edges_iter() {
            let (c_from, c_to) = (component_of[from], component_of[to]);
            if c_from != c_to {
                successors[c_from].insert(c_to);
            }
        }
        let mut in_degree = vec![0; members.len()];
        for &c in successors.iter().flatten() {
            in_degree[c] += 1;
        }

        Self {
            members,
            component_of,
            successors: successors
                .into_iter()
                .map(|succs| succs.into_iter().collect())
                .collect(),
            in_degree,
        }
    }
}

impl<N> Condensation<N> {
    /// Number of strongly connected components.
    #[inline]
    pub fn component_count(&self) -> usize {
        self.members.len()
    }

    /// The nodes of `component`, in ascending order.
    #[inline]
    pub fn members(&self, component: usize) -> &[N] {
        &self.members[component]
    }

    /// The component containing `node`, if `node` belongs to the graph.
    #[inline]
    pub fn component_of(&self, node: &N) -> Option<usize>
    where
        N: Ord,
    {
        self.component_of.get(node).copied()
    }

    /// The components reached by an edge leaving `component`, in ascending
    /// order.
    #[inline]
    pub fn successors(&self, component: usize) -> &[usize] {
        &self.successors[component]
    }

    /// Number of components with an edge into `component`.
    #[inline]
    pub fn in_degree(&self, component: usize) -> usize {
        self.in_degree[component]
    }

    /// Iterates over the components without incoming edges.
    pub fn sources(&self) -> impl Iterator<Item = usize> + '_ {
        self.in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(c, _)| c)
    }
}
