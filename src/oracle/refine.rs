//! Individualisation-refinement canonical labelling.
//!
//! The search tree is built from isomorphism-invariant operations only:
//!
//! 1. *Refinement* splits every cell of an ordered partition by the multiset
//!    of cells of each vertex's successors and predecessors, until no cell
//!    splits. New cells are ordered by their splitting signature.
//! 2. *Individualisation* picks the first non-singleton cell and, for each of
//!    its vertices, places that vertex in a singleton cell just before the
//!    remainder of the cell, then refines again.
//!
//! Every leaf is a discrete partition, i.e. a vertex order. The canonical
//! order is the leaf whose relabelled edge list is lexicographically least.
//! Two leaves with equal edge lists differ by an automorphism. Such an
//! automorphism maps the subtree holding the earlier leaf onto the subtree
//! holding the later one, below their deepest common ancestor, so the search
//! backjumps to that ancestor. Children of a node that are equivalent under
//! the automorphisms fixing its individualised vertices are skipped.
//!
//! Comparing every leaf with the first leaf makes the automorphisms found
//! generate the whole automorphism group, so the orbits fall out of the same
//! search. Only automorphisms merging orbits are kept.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::oracle::{CanonicalOracle, OracleError, OracleGraph};

/// An ordered partition of the vertices.
type Partition = Vec<Vec<usize>>;

/// The sorted relabelled edge list of a discrete partition.
type Certificate = Vec<(usize, usize)>;

/// Exact reference implementation of a [`CanonicalOracle`].
///
/// Worst-case exponential, as every canonical labelling algorithm. Symmetry
/// is cheap: every automorphism found prunes the equivalent part of the
/// search tree, so e.g. edgeless graphs, stars and cycles are labelled in
/// polynomial time. Suitable for the graph sizes found in syntax trees,
/// schemas and tests; large or adversarial inputs are better served by a
/// dedicated solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefinementOracle;

impl RefinementOracle {
    /// Create a new oracle.
    pub fn new() -> Self {
        Self
    }
}

impl CanonicalOracle for RefinementOracle {
    fn canonical_label(&self, graph: &OracleGraph) -> Result<Vec<usize>, OracleError> {
        Ok(Search::run(graph).leaf.order)
    }

    fn automorphism_orbits(&self, graph: &OracleGraph) -> Result<Vec<Vec<usize>>, OracleError> {
        Ok(Search::run(graph).orbits)
    }

    fn analyze(&self, graph: &OracleGraph) -> Result<(Vec<usize>, Vec<Vec<usize>>), OracleError> {
        let search = Search::run(graph);
        Ok((search.leaf.order, search.orbits))
    }
}

/// A leaf of the search tree.
#[derive(Clone, Debug, Default)]
struct Leaf {
    certificate: Certificate,
    /// `order[position]` is the vertex placed at `position`.
    order: Vec<usize>,
    /// The vertices individualised on the way down.
    path: Vec<usize>,
}

/// How the search resumes after a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Continue,
    /// Resume at the ancestor of the given depth.
    Backjump(usize),
}

/// State of a search in progress.
struct Search<'g> {
    graph: &'g OracleGraph,
    first: Option<Leaf>,
    best: Option<Leaf>,
    /// Automorphisms found, each merging orbits when found.
    automorphisms: Vec<Vec<usize>>,
    /// Orbits of the group generated by `automorphisms`.
    orbits: UnionFind,
    leaves: usize,
}

/// A finished search.
struct SearchResult {
    leaf: Leaf,
    /// Orbits of the automorphism group, listed by least member.
    orbits: Vec<Vec<usize>>,
}

impl<'g> Search<'g> {
    fn run(graph: &'g OracleGraph) -> SearchResult {
        let mut search = Self {
            graph,
            first: None,
            best: None,
            automorphisms: Vec::new(),
            orbits: UnionFind::new(graph.node_count()),
            leaves: 0,
        };
        let root = refine(graph, graph.colours().to_vec());
        search.explore(root, &mut Vec::new());
        tracing::trace!(
            vertices = graph.node_count(),
            leaves = search.leaves,
            automorphisms = search.automorphisms.len(),
            "canonical search finished"
        );
        SearchResult {
            leaf: search.best.unwrap_or_default(),
            orbits: search.orbits.classes(),
        }
    }

    fn explore(&mut self, cells: Partition, path: &mut Vec<usize>) -> Step {
        let Some(target) = cells.iter().position(|cell| cell.len() > 1) else {
            return self.leaf(&cells, path);
        };

        let depth = path.len();
        let candidates = cells[target].iter().copied().sorted().collect_vec();
        // Orbits of the automorphisms fixing `path`, which map this node
        // onto itself.
        let mut equivalent = UnionFind::new(self.graph.node_count());
        let mut absorbed = 0;
        let mut explored: Vec<usize> = Vec::new();
        for v in candidates {
            for aut in &self.automorphisms[absorbed..] {
                if path.iter().all(|&f| aut[f] == f) {
                    equivalent.union_map(aut);
                }
            }
            absorbed = self.automorphisms.len();
            if explored.iter().any(|&e| equivalent.same(e, v)) {
                continue;
            }

            let child = refine(self.graph, individualise(&cells, target, v));
            path.push(v);
            let step = self.explore(child, path);
            path.pop();
            explored.push(v);
            if let Step::Backjump(level) = step {
                if level < depth {
                    return step;
                }
            }
        }
        Step::Continue
    }

    fn leaf(&mut self, cells: &Partition, path: &[usize]) -> Step {
        self.leaves += 1;
        let order: Vec<usize> = cells.iter().map(|cell| cell[0]).collect();
        let leaf = Leaf {
            certificate: certificate(self.graph, &order),
            order,
            path: path.to_vec(),
        };
        if self.first.is_none() {
            self.best = Some(leaf.clone());
            self.first = Some(leaf);
            return Step::Continue;
        }

        let matched = [&self.first, &self.best]
            .into_iter()
            .flatten()
            .find(|known| known.certificate == leaf.certificate)
            .map(|known| {
                let level = known
                    .path
                    .iter()
                    .zip(&leaf.path)
                    .take_while(|(a, b)| a == b)
                    .count();
                (mapping(&known.order, &leaf.order), level)
            });
        if let Some((aut, level)) = matched {
            self.record(aut);
            return Step::Backjump(level);
        }

        if self
            .best
            .as_ref()
            .map_or(true, |best| leaf.certificate < best.certificate)
        {
            self.best = Some(leaf);
        }
        Step::Continue
    }

    /// Keeps `aut` if it merges orbits.
    fn record(&mut self, aut: Vec<usize>) {
        let mut merged = false;
        for (v, &w) in aut.iter().enumerate() {
            merged |= self.orbits.union(v, w);
        }
        if merged {
            self.automorphisms.push(aut);
        }
    }
}

/// The permutation sending `from[i]` to `to[i]`.
fn mapping(from: &[usize], to: &[usize]) -> Vec<usize> {
    let mut map = vec![0; from.len()];
    for (&f, &t) in from.iter().zip(to) {
        map[f] = t;
    }
    map
}

/// The edges of `graph` relabelled by vertex position in `order`, sorted.
fn certificate(graph: &OracleGraph, order: &[usize]) -> Certificate {
    let mut position = vec![0; order.len()];
    for (pos, &v) in order.iter().enumerate() {
        position[v] = pos;
    }
    graph
        .edges()
        .map(|(s, t)| (position[s], position[t]))
        .sorted_unstable()
        .collect()
}

/// Splits `v` from cell `target` into a singleton placed just before it.
fn individualise(cells: &Partition, target: usize, v: usize) -> Partition {
    let mut result = Vec::with_capacity(cells.len() + 1);
    for (i, cell) in cells.iter().enumerate() {
        if i == target {
            result.push(vec![v]);
            result.push(cell.iter().copied().filter(|&w| w != v).collect());
        } else {
            result.push(cell.clone());
        }
    }
    result
}

/// Refines `cells` until every vertex of a cell has the same number of
/// successors and predecessors in each cell.
fn refine(graph: &OracleGraph, mut cells: Partition) -> Partition {
    let mut cell_of = vec![0; graph.node_count()];
    loop {
        for (i, cell) in cells.iter().enumerate() {
            for &v in cell {
                cell_of[v] = i;
            }
        }
        let signature = |v: usize| {
            let outgoing = graph.successors(v).iter().map(|&t| cell_of[t]).sorted_unstable();
            let incoming = graph.predecessors(v).iter().map(|&s| cell_of[s]).sorted_unstable();
            (outgoing.collect_vec(), incoming.collect_vec())
        };

        let mut refined = Vec::with_capacity(cells.len());
        for cell in &cells {
            if cell.len() == 1 {
                refined.push(cell.clone());
                continue;
            }
            let keyed = cell
                .iter()
                .map(|&v| (signature(v), v))
                .sorted()
                .chunk_by(|(sig, _)| sig.clone());
            for (_, group) in &keyed {
                refined.push(group.map(|(_, v)| v).collect());
            }
        }

        let stable = refined.len() == cells.len();
        cells = refined;
        if stable {
            return cells;
        }
    }
}

/// Disjoint sets over the vertices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut v: usize) -> usize {
        while self.parent[v] != v {
            self.parent[v] = self.parent[self.parent[v]];
            v = self.parent[v];
        }
        v
    }

    /// Joins the sets of `a` and `b`, returning whether they were distinct.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
        a != b
    }

    /// Joins every vertex with its image under `map`.
    fn union_map(&mut self, map: &[usize]) {
        for (v, &w) in map.iter().enumerate() {
            self.union(v, w);
        }
    }

    fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// The sets, each sorted, listed by least member.
    fn classes(&mut self) -> Vec<Vec<usize>> {
        let mut classes: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for v in 0..self.parent.len() {
            classes.entry(self.find(v)).or_default().push(v);
        }
        classes.into_values().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::oracle::Successors;
    use itertools::Itertools;
    use rstest::rstest;
    use std::time::{Duration, Instant};

    fn digraph(n: usize, edges: &[(usize, usize)], colours: Vec<Vec<usize>>) -> OracleGraph {
        let mut succs = vec![Successors::new(); n];
        for &(s, t) in edges {
            succs[s].push(t);
        }
        OracleGraph::new(succs, colours).unwrap()
    }

    fn uncoloured(n: usize, edges: &[(usize, usize)]) -> OracleGraph {
        digraph(n, edges, vec![(0..n).collect()])
    }

    /// All automorphisms by brute force.
    fn brute_force_orbits(graph: &OracleGraph) -> Vec<Vec<usize>> {
        let n = graph.node_count();
        let edges: Vec<_> = graph.edges().sorted().collect();
        let colour_of = |v: usize| graph.colours().iter().position(|c| c.contains(&v));
        let mut equivalent = UnionFind::new(n);
        for perm in (0..n).permutations(n) {
            let preserves_colours = (0..n).all(|v| colour_of(v) == colour_of(perm[v]));
            let mapped: Vec<_> = edges.iter().map(|&(s, t)| (perm[s], perm[t])).sorted().collect();
            if preserves_colours && mapped == edges {
                equivalent.union_map(&perm);
            }
        }
        orbits_of(&mut equivalent, n)
    }

    fn orbits_of(uf: &mut UnionFind, n: usize) -> Vec<Vec<usize>> {
        let mut classes: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for v in 0..n {
            classes.entry(uf.find(v)).or_default().push(v);
        }
        classes.into_values().sorted().collect()
    }

    /// The relabelled graph `perm(graph)`.
    fn permuted(graph: &OracleGraph, perm: &[usize]) -> OracleGraph {
        let edges: Vec<_> = graph.edges().map(|(s, t)| (perm[s], perm[t])).collect();
        let colours = graph
            .colours()
            .iter()
            .map(|c| c.iter().map(|&v| perm[v]).collect())
            .collect();
        digraph(graph.node_count(), &edges, colours)
    }

    fn canonical_certificate(graph: &OracleGraph) -> Certificate {
        let order = RefinementOracle.canonical_label(graph).unwrap();
        certificate(graph, &order)
    }

    #[rstest]
    #[case::cycle(uncoloured(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]), vec![vec![0, 1, 2, 3]])]
    #[case::path(uncoloured(3, &[(0, 1), (1, 2)]), vec![vec![0], vec![1], vec![2]])]
    #[case::empty(uncoloured(4, &[]), vec![vec![0, 1, 2, 3]])]
    #[case::star(uncoloured(4, &[(0, 1), (0, 2), (0, 3)]), vec![vec![0], vec![1, 2, 3]])]
    #[case::coloured_cycle(
        digraph(4, &[(0, 1), (1, 2), (2, 3), (3, 0)], vec![vec![0, 2], vec![1, 3]]),
        vec![vec![0, 2], vec![1, 3]]
    )]
    #[case::two_triangles(
        uncoloured(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]),
        vec![vec![0, 1, 2, 3, 4, 5]]
    )]
    #[case::linked_triangles(
        uncoloured(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (0, 3)]),
        vec![vec![0], vec![1], vec![2], vec![3], vec![4], vec![5]]
    )]
    #[case::bipartite(
        uncoloured(5, &[(0, 2), (0, 3), (0, 4), (1, 2), (1, 3), (1, 4)]),
        vec![vec![0, 1], vec![2, 3, 4]]
    )]
    fn known_orbits(#[case] graph: OracleGraph, #[case] expected: Vec<Vec<usize>>) {
        assert_eq!(RefinementOracle.automorphism_orbits(&graph).unwrap(), expected);
        assert_eq!(brute_force_orbits(&graph), expected);
    }

    #[rstest]
    #[case::edgeless(uncoloured(64, &[]), 1)]
    #[case::star(uncoloured(65, &(1..65).map(|leaf| (0, leaf)).collect_vec()), 2)]
    #[case::cycle(uncoloured(64, &(0..64).map(|v| (v, (v + 1) % 64)).collect_vec()), 1)]
    #[case::two_stars(
        uncoloured(34, &(2..34).map(|leaf| (leaf % 2, leaf)).collect_vec()),
        2
    )]
    fn large_symmetric_graphs(#[case] graph: OracleGraph, #[case] n_orbits: usize) {
        let start = Instant::now();
        let (order, orbits) = RefinementOracle.analyze(&graph).unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed < Duration::from_secs(2), "search took {elapsed:?}");
        assert!(graph.check_permutation(&order).is_ok());
        assert_eq!(orbits.len(), n_orbits);
    }

    #[test]
    fn order_is_a_permutation() {
        let graph = uncoloured(5, &[(0, 1), (1, 2), (2, 0), (3, 4)]);
        let (order, orbits) = RefinementOracle.analyze(&graph).unwrap();
        assert!(graph.check_permutation(&order).is_ok());
        assert!(graph.check_orbits(&orbits).is_ok());
    }

    #[test]
    fn empty_graph() {
        let graph = uncoloured(0, &[]);
        assert_eq!(RefinementOracle.canonical_label(&graph).unwrap(), Vec::<usize>::new());
        assert!(RefinementOracle.automorphism_orbits(&graph).unwrap().is_empty());
    }

    /// Every digraph on three vertices, with self-loops, under every
    /// relabelling: certificates are invariant and orbits exact.
    #[test]
    fn exhaustive_three_vertices() {
        let n = 3;
        let pairs = (0..n).cartesian_product(0..n).collect_vec();
        for mask in 0u32..(1 << pairs.len()) {
            let edges = pairs
                .iter()
                .enumerate()
                .filter(|(i, _)| (mask >> i) & 1 == 1)
                .map(|(_, &e)| e)
                .collect_vec();
            let graph = uncoloured(n, &edges);
            let expected = canonical_certificate(&graph);
            for perm in (0..n).permutations(n) {
                assert_eq!(canonical_certificate(&permuted(&graph, &perm)), expected);
            }
            assert_eq!(
                RefinementOracle.automorphism_orbits(&graph).unwrap(),
                brute_force_orbits(&graph),
                "edges {edges:?}"
            );
        }
    }

    #[test]
    fn colours_are_respected() {
        // Same edges, colour classes swapped: not isomorphic as ordered
        // colourings.
        let g1 = digraph(2, &[(0, 1)], vec![vec![0], vec![1]]);
        let g2 = digraph(2, &[(0, 1)], vec![vec![1], vec![0]]);
        assert_ne!(canonical_certificate(&g1), canonical_certificate(&g2));
    }
}
