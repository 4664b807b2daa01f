//! Best-bin-first candidate enumeration across a forest.
//!
//! A single min-heap drives backtracking over every tree at once, so each
//! pop explores the globally most promising frontier node. Entries are
//! ordered by the L1 bounding-box lower bound, which fits 16 bits (L1 over
//! bytes is at most 32640); together with a 16-bit tree id the whole entry
//! packs into 8 bytes, keeping the hot heap small.

use std::collections::BinaryHeap;

use smallvec::SmallVec;

use crate::descriptor::Descriptor;
use crate::kdforest::KdForest;
use crate::kdforest::matching::Best2;
use crate::kdforest::tree::Node;

/// Preallocation for the per-query heap; comfortably above
/// `tree_count * tree_depth` so steady-state pushes never allocate.
const HEAP_RESERVE: usize = 1024;

/// Candidate leaf slices for one query. Usually a handful; spills to the
/// heap for generous descriptor budgets.
pub(crate) type LeafList<'a> = SmallVec<[&'a [u32]; 32]>;

/// Frontier entry: one node of one tree, keyed by its box lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    distance: u16,
    tree: u16,
    node: u32,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, smallest distance on top.
        // Ties break by (tree, node) so the pop order is deterministic.
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Pop leaves in lower-bound order until the descriptor budget is spent.
///
/// May overshoot `max_descriptors` by at most the size of the last leaf.
pub(crate) fn candidate_leaves<'a>(
    forest: &'a KdForest,
    query: &Descriptor,
    max_descriptors: usize,
) -> LeafList<'a> {
    let trees = forest.trees();
    let mut heap = BinaryHeap::with_capacity(HEAP_RESERVE);
    for (t, tree) in trees.iter().enumerate() {
        heap.push(HeapEntry {
            distance: tree.bounding_box(0).l1_lower_bound(query) as u16,
            tree: t as u16,
            node: 0,
        });
    }

    let mut leaves = LeafList::new();
    let mut found = 0usize;
    while found < max_descriptors {
        let Some(entry) = heap.pop() else { break };
        let tree = &trees[usize::from(entry.tree)];
        match *tree.node(entry.node) {
            Node::Leaf { begin, end } => {
                let slice = tree.leaf_slice(begin, end);
                found += slice.len();
                leaves.push(slice);
            }
            Node::Internal { right, .. } => {
                let left = entry.node + 1;
                heap.push(HeapEntry {
                    distance: tree.bounding_box(left).l1_lower_bound(query) as u16,
                    tree: entry.tree,
                    node: left,
                });
                heap.push(HeapEntry {
                    distance: tree.bounding_box(right).l1_lower_bound(query) as u16,
                    tree: entry.tree,
                    node: right,
                });
            }
        }
    }
    leaves
}

impl KdForest {
    /// Enumerate candidate leaf slices for `query`, best bin first.
    ///
    /// Each returned slice is a run of descriptor indices owned by one leaf
    /// of one tree; the same index can appear in slices from different
    /// trees. Enumeration stops once the slices together hold at least
    /// `max_descriptors` indices (overshooting by at most one leaf) or
    /// every leaf of every tree has been returned.
    #[must_use]
    pub fn query_2nn_leaves<'a>(
        &'a self,
        query: &Descriptor,
        max_descriptors: usize,
    ) -> Vec<&'a [u32]> {
        candidate_leaves(self, query, max_descriptors).into_vec()
    }

    /// Two nearest neighbours of `query` among the enumerated candidates.
    ///
    /// Candidates are scored exactly under the forest's metric; the slots
    /// hold the two smallest *distinct* distances seen, so duplicate
    /// best-distance candidates (the same descriptor reached through
    /// several trees, or exact duplicates in the data) never collapse the
    /// result. Total: an empty forest or a zero budget yields an empty
    /// [`Best2`].
    #[must_use]
    pub fn query_2nn(&self, query: &Descriptor, max_descriptors: usize) -> Best2 {
        let metric = self.metric();
        let descriptors = self.descriptors();
        candidate_leaves(self, query, max_descriptors)
            .iter()
            .map(|leaf| {
                let mut acc = Best2::new();
                for &i in *leaf {
                    acc.update(metric.distance(query, &descriptors[i as usize]), i);
                }
                acc
            })
            .fold(Best2::new(), |merged, leaf_best| merged.combine(&leaf_best))
    }
}
