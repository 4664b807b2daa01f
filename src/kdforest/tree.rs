//! Single randomised KD-tree: packed storage, recursive builder, validation.
//!
//! A tree is three parallel arrays. `nodes` holds the link records with the
//! root at index 0 and every left child at `parent + 1`; `bbox` holds the
//! bounding box of each node at the same index, kept separate so traversal
//! distance probes touch only box cache lines; `list` is a permutation of
//! the descriptor indices, with every leaf owning one contiguous subrange.
//!
//! Because the node array is emitted in build order (parent, entire left
//! subtree, entire right subtree), array order is exactly left-first DFS
//! preorder, and the leaf ranges partition `[0, N)` in that order.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::descriptor::{DESCRIPTOR_DIM, Descriptor};
use crate::error::{ForestError, Result};
use crate::kdforest::bbox::{BoundingBox, SPLIT_DIMENSION_COUNT, SplitDimensions};

/// Retry budget for the randomised partitioning of one node.
pub(crate) const MAX_PARTITION_ATTEMPTS: usize = 16;

/// Added to the configured leaf size so leaves never get pathologically
/// small.
const LEAF_SIZE_PADDING: u32 = 16;

/// One packed tree node. Left children are implicit at `parent + 1`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Node {
    /// Splitting record: descriptors with `d[dim] < val` are in the left
    /// subtree, the rest in the right subtree at `right`.
    Internal { dim: u8, val: u8, right: u32 },
    /// Half-open `[begin, end)` range into the tree's index permutation.
    Leaf { begin: u32, end: u32 },
}

/// A single randomised KD-tree over a shared descriptor array.
///
/// Trees store descriptor *indices*, never descriptors; several trees built
/// with different seeds over the same array form a forest.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<Node>,
    bbox: Vec<BoundingBox>,
    list: Vec<u32>,
}

impl KdTree {
    /// Build one tree. `seed` fully determines the result.
    pub(crate) fn build(
        descriptors: &[Descriptor],
        split_dims: &SplitDimensions,
        leaf_size: u32,
        seed: u64,
    ) -> Result<Self> {
        debug_assert!(!descriptors.is_empty());
        let count = descriptors.len() as u32;
        let leaf_capacity = leaf_size + LEAF_SIZE_PADDING;

        let node_estimate = (2 * descriptors.len()) / leaf_capacity as usize + 1;
        let mut builder = TreeBuilder {
            descriptors,
            split_dims,
            leaf_capacity,
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::with_capacity(node_estimate),
            bbox: Vec::with_capacity(node_estimate),
            list: (0..count).collect(),
        };

        builder.push_placeholder();
        builder.split(0, 0, count)?;

        let tree = KdTree {
            nodes: builder.nodes,
            bbox: builder.bbox,
            list: builder.list,
        };
        // Always validate; it's cheap next to the build itself.
        tree.validate(count, leaf_capacity)?;
        Ok(tree)
    }

    /// Number of nodes (internal and leaf).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of descriptors indexed by this tree.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.list.len()
    }

    /// Leaf index ranges in left-first DFS order.
    ///
    /// Concatenated, the returned slices form a permutation of
    /// `0..descriptor_count()`.
    pub fn leaves(&self) -> impl Iterator<Item = &[u32]> {
        self.nodes.iter().filter_map(|node| match *node {
            Node::Leaf { begin, end } => {
                Some(&self.list[begin as usize..end as usize])
            }
            Node::Internal { .. } => None,
        })
    }

    #[inline]
    pub(crate) fn node(&self, i: u32) -> &Node {
        &self.nodes[i as usize]
    }

    #[inline]
    pub(crate) fn bounding_box(&self, i: u32) -> &BoundingBox {
        &self.bbox[i as usize]
    }

    #[inline]
    pub(crate) fn leaf_slice(&self, begin: u32, end: u32) -> &[u32] {
        &self.list[begin as usize..end as usize]
    }

    /// Check every structural invariant of the packed layout.
    fn validate(&self, count: u32, leaf_capacity: u32) -> Result<()> {
        if self.nodes.len() != self.bbox.len() {
            return Err(ForestError::InvariantViolation(format!(
                "{} nodes but {} bounding boxes",
                self.nodes.len(),
                self.bbox.len()
            )));
        }
        let mut cursor = 0u32;
        let mut index_sum = 0u64;
        self.validate_node(0, count, leaf_capacity, &mut cursor, &mut index_sum)?;
        if cursor != count {
            return Err(ForestError::InvariantViolation(format!(
                "leaf ranges cover [0, {cursor}) instead of [0, {count})"
            )));
        }
        // Capacity is < 2^31, so the product stays well inside u64.
        let expected = u64::from(count) * u64::from(count.saturating_sub(1)) / 2;
        if index_sum != expected {
            return Err(ForestError::InvariantViolation(format!(
                "leaf index sum {index_sum}, expected {expected}"
            )));
        }
        Ok(())
    }

    fn validate_node(
        &self,
        n: u32,
        count: u32,
        leaf_capacity: u32,
        cursor: &mut u32,
        index_sum: &mut u64,
    ) -> Result<()> {
        let node = self.nodes.get(n as usize).ok_or_else(|| {
            ForestError::InvariantViolation(format!("node index {n} out of bounds"))
        })?;
        let bb = &self.bbox[n as usize];
        for k in 0..DESCRIPTOR_DIM {
            if bb.min.0[k] > bb.max.0[k] {
                return Err(ForestError::InvariantViolation(format!(
                    "box of node {n} inverted on component {k}"
                )));
            }
        }
        match *node {
            Node::Leaf { begin, end } => {
                if begin != *cursor || end <= begin {
                    return Err(ForestError::InvariantViolation(format!(
                        "leaf {n} range [{begin}, {end}) breaks DFS coverage at {cursor}"
                    )));
                }
                if end - begin >= 2 * leaf_capacity {
                    return Err(ForestError::InvariantViolation(format!(
                        "leaf {n} holds {} descriptors, capacity {leaf_capacity}",
                        end - begin
                    )));
                }
                for &i in self.leaf_slice(begin, end) {
                    if i >= count {
                        return Err(ForestError::InvariantViolation(format!(
                            "leaf {n} references descriptor {i} of {count}"
                        )));
                    }
                    *index_sum += u64::from(i);
                }
                *cursor = end;
            }
            Node::Internal { dim, right, .. } => {
                if usize::from(dim) >= DESCRIPTOR_DIM {
                    return Err(ForestError::InvariantViolation(format!(
                        "node {n} splits on dimension {dim}"
                    )));
                }
                let left = n + 1;
                if right as usize >= self.nodes.len() || right <= left {
                    return Err(ForestError::InvariantViolation(format!(
                        "node {n} has right child {right}"
                    )));
                }
                self.validate_node(left, count, leaf_capacity, cursor, index_sum)?;
                self.validate_node(right, count, leaf_capacity, cursor, index_sum)?;
            }
        }
        Ok(())
    }
}

struct TreeBuilder<'a> {
    descriptors: &'a [Descriptor],
    split_dims: &'a SplitDimensions,
    leaf_capacity: u32,
    rng: StdRng,
    nodes: Vec<Node>,
    bbox: Vec<BoundingBox>,
    list: Vec<u32>,
}

impl TreeBuilder<'_> {
    fn push_placeholder(&mut self) {
        self.nodes.push(Node::Leaf { begin: 0, end: 0 });
        self.bbox.push(BoundingBox::default());
    }

    /// Turn the placeholder at `node` into a leaf over `[begin, end)` or an
    /// internal node with both subtrees built.
    fn split(&mut self, node: usize, begin: u32, end: u32) -> Result<()> {
        debug_assert!(begin < end);
        if end - begin <= self.leaf_capacity {
            self.nodes[node] = Node::Leaf { begin, end };
            self.bbox[node] = BoundingBox::of(
                self.descriptors,
                &self.list[begin as usize..end as usize],
            );
            return Ok(());
        }

        let (dim, val, mid) = self.partition(begin, end)?;

        // Left child lands at node + 1, which the layout relies on.
        let left = self.nodes.len();
        self.push_placeholder();
        self.split(left, begin, mid)?;

        let right = self.nodes.len();
        self.push_placeholder();
        self.split(right, mid, end)?;

        self.nodes[node] = Node::Internal {
            dim,
            val,
            right: right as u32,
        };
        let merged = self.bbox[left].union(&self.bbox[right]);
        self.bbox[node] = merged;
        Ok(())
    }

    /// Randomised partitioning of `[begin, end)`.
    ///
    /// Each attempt samples a dimension from the shared high-variance set
    /// and a split value uniformly from the range's spread along it.
    /// When the sampled dimension has no usable spread the attempt falls
    /// back to a uniform choice among the dimensions that can actually
    /// split this range; a range with no such dimension burns the attempt.
    /// Returns the split record and the pivot offset.
    fn partition(&mut self, begin: u32, end: u32) -> Result<(u8, u8, u32)> {
        for _ in 0..MAX_PARTITION_ATTEMPTS {
            let pick = self.rng.random_range(0..SPLIT_DIMENSION_COUNT);
            let mut dim = self.split_dims.get(pick);
            let (mut lo, mut hi) = self.spread(dim, begin, end);
            if hi - lo <= 1 {
                match self.random_splittable_dim(begin, end) {
                    Some(d) => {
                        dim = d;
                        (lo, hi) = self.spread(dim, begin, end);
                    }
                    None => continue,
                }
            }

            let val = self.rng.random_range(lo..=hi);
            let mid = self.partition_in_place(dim, val, begin, end);
            if mid == begin || mid == end {
                continue;
            }
            return Ok((dim, val, mid));
        }
        Err(ForestError::PartitionFailure {
            attempts: MAX_PARTITION_ATTEMPTS,
        })
    }

    /// Min and max component value across the range along `dim`.
    fn spread(&self, dim: u8, begin: u32, end: u32) -> (u8, u8) {
        let mut lo = u8::MAX;
        let mut hi = 0u8;
        for &i in &self.list[begin as usize..end as usize] {
            let v = self.descriptors[i as usize].0[usize::from(dim)];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo, hi)
    }

    /// Uniform pick among the dimensions whose spread across the range
    /// exceeds one. `None` when the range is constant everywhere.
    fn random_splittable_dim(&mut self, begin: u32, end: u32) -> Option<u8> {
        let mut lo = [u8::MAX; DESCRIPTOR_DIM];
        let mut hi = [0u8; DESCRIPTOR_DIM];
        for &i in &self.list[begin as usize..end as usize] {
            let d = self.descriptors[i as usize].as_bytes();
            for k in 0..DESCRIPTOR_DIM {
                lo[k] = lo[k].min(d[k]);
                hi[k] = hi[k].max(d[k]);
            }
        }
        let splittable: Vec<u8> = (0..DESCRIPTOR_DIM as u8)
            .filter(|&k| hi[usize::from(k)] - lo[usize::from(k)] > 1)
            .collect();
        if splittable.is_empty() {
            None
        } else {
            Some(splittable[self.rng.random_range(0..splittable.len())])
        }
    }

    /// Move indices with `d[dim] < val` to the front of the range.
    /// Returns the pivot offset (`begin` or `end` means one-sided).
    fn partition_in_place(&mut self, dim: u8, val: u8, begin: u32, end: u32) -> u32 {
        let mut mid = begin as usize;
        for i in begin as usize..end as usize {
            if self.descriptors[self.list[i] as usize].0[usize::from(dim)] < val {
                self.list.swap(i, mid);
                mid += 1;
            }
        }
        mid as u32
    }
}
