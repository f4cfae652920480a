use std::iter::FusedIterator;

use bitvec::vec::BitVec;

use super::Condensation;

/// Returns an iterator over the components of a [`Condensation`] in
/// post-order, starting from `roots`. Every component is returned after all
/// the components it reaches.
///
/// # Example
///
/// ```
/// # use dihash::{algorithms::{postorder, Condensation}, LabelledGraph};
/// let graph = LabelledGraph::from_edges(
///     [(0, "a"), (1, "b"), (2, "c")],
///     [(0, 1), (1, 2)],
/// ).unwrap();
/// let condensation = Condensation::new(&graph);
/// let order: Vec<_> = postorder(&condensation, [0]).collect();
/// assert_eq!(order, [2, 1, 0]);
/// ```
pub fn postorder<N>(
    condensation: &Condensation<N>,
    roots: impl IntoIterator<Item = usize>,
) -> PostOrder<'_, N, fn(usize, usize) -> bool> {
    PostOrder::new(condensation, roots, (|_, _| true) as fn(usize, usize) -> bool)
}

/// Returns an iterator over the components of a [`Condensation`] in
/// post-order, only following the edges between components for which
/// `edge_filter(from, to)` returns true.
///
/// The roots are always returned; components only reachable through filtered
/// edges are not.
pub fn postorder_filtered<N, F>(
    condensation: &Condensation<N>,
    roots: impl IntoIterator<Item = usize>,
    edge_filter: F,
) -> PostOrder<'_, N, F>
where
    F: FnMut(usize, usize) -> bool,
{
    PostOrder::new(condensation, roots, edge_filter)
}

/// Iterator over the components of a [`Condensation`] in post-order.
pub struct PostOrder<'c, N, F> {
    condensation: &'c Condensation<N>,
    stack: Vec<usize>,
    visited: BitVec,
    finished: BitVec,
    edge_filter: F,
}

impl<'c, N, F> PostOrder<'c, N, F>
where
    F: FnMut(usize, usize) -> bool,
{
    fn new(condensation: &'c Condensation<N>, roots: impl IntoIterator<Item = usize>, edge_filter: F) -> Self {
        let count = condensation.component_count();
        let mut stack: Vec<usize> = roots.into_iter().collect();
        // Roots are popped last-in first-out; reverse so the first root is
        // finished first.
        stack.reverse();
        Self {
            condensation,
            stack,
            visited: BitVec::repeat(false, count),
            finished: BitVec::repeat(false, count),
            edge_filter,
        }
    }
}

impl<'c, N, F> Iterator for PostOrder<'c, N, F>
where
    F: FnMut(usize, usize) -> bool,
{
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(next) = self.stack.last().copied() {
            if !self.visited.replace(next, true) {
                // First visit: leave the component on the stack and push its
                // unvisited successors above it.
                for &succ in self.condensation.successors(next).iter().rev() {
                    if !self.visited[succ] && (self.edge_filter)(next, succ) {
                        self.stack.push(succ);
                    }
                }
            } else if !self.finished.replace(next, true) {
                // Second visit: everything reachable from it is finished.
                self.stack.pop();
                return Some(next);
            } else {
                self.stack.pop();
            }
        }
        None
    }
}

impl<'c, N, F> FusedIterator for PostOrder<'c, N, F> where F: FnMut(usize, usize) -> bool {}
