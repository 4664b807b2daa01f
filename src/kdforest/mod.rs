//! Randomised KD-forest over byte descriptors.
//!
//! A forest is a set of KD-trees built independently over the same
//! descriptor array with different random seeds. Each tree partitions the
//! data by recursive randomised splits drawn from the dataset's five
//! highest-variance dimensions; queries run best-bin-first across all
//! trees at once, scoring a budgeted number of candidate descriptors
//! exactly and accepting matches through the Lowe ratio test.
//!
//! # Algorithm
//!
//! - **Build**: per tree, recursively partition the index permutation on a
//!   random high-variance dimension at a random split value, stopping at
//!   leaf-sized ranges. Nodes, bounding boxes, and the permutation live in
//!   packed parallel arrays.
//! - **Search**: one min-heap over `(box lower bound, tree, node)` entries
//!   drives backtracking across every tree simultaneously until the
//!   descriptor budget is spent.
//! - **Match**: candidates are reduced to the two smallest distinct
//!   distances; `d0/d1 < 0.8` accepts.
//!
//! More trees raise recall for a fixed budget at proportional build cost;
//! the budget trades recall against query time.
//!
//! # References
//!
//! - Beis & Lowe (1997): "Shape indexing using approximate
//!   nearest-neighbour search in high-dimensional spaces"
//! - Lowe (2004): "Distinctive image features from scale-invariant
//!   keypoints"
//! - Muja & Lowe (2009): "Fast approximate nearest neighbors with
//!   automatic algorithm configuration"

pub mod bbox;
mod matching;
mod search;
mod tree;

pub use bbox::{BoundingBox, SPLIT_DIMENSION_COUNT, SplitDimensions, split_dimensions};
pub use matching::Best2;
pub use tree::KdTree;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::distance::DistanceKind;
use crate::error::{ForestError, Result};

/// Descriptor indices are stored in 31 bits of headroom below `u32`.
const MAX_DESCRIPTOR_COUNT: usize = 1 << 31;

/// Forest construction and query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of independently-built trees.
    pub tree_count: u32,

    /// Requested leaf size. The builder pads this so leaves never get
    /// pathologically small.
    pub leaf_size: u32,

    /// Default per-query candidate budget: how many descriptors the
    /// best-bin-first search may touch before stopping.
    pub max_descriptors: usize,

    /// Seed for the build. `None` draws a fresh seed; any fixed value
    /// makes the forest fully reproducible, parallel build included.
    pub seed: Option<u64>,

    /// Metric used to score candidates and threshold the ratio test.
    pub metric: DistanceKind,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            tree_count: 4,
            leaf_size: 32,
            max_descriptors: 512,
            seed: None,
            metric: DistanceKind::L2Squared,
        }
    }
}

/// An immutable forest of randomised KD-trees sharing one descriptor array.
///
/// Built once, then read-only: queries never mutate the forest, so it can
/// be shared across threads without synchronisation.
#[derive(Debug)]
pub struct KdForest {
    descriptors: Vec<Descriptor>,
    trees: Vec<KdTree>,
    split_dims: SplitDimensions,
    params: ForestParams,
}

impl KdForest {
    /// Build a forest over `descriptors`.
    ///
    /// The split-dimension set is computed once and shared by every tree;
    /// trees build in parallel, each from its own seed dealt by a parent
    /// stream, so the result is identical to a sequential build. An empty
    /// descriptor array yields an empty forest on which every query is
    /// total and returns nothing.
    ///
    /// # Errors
    ///
    /// [`ForestError::CapacityExceeded`] when the descriptor count needs
    /// more than 31 bits; [`ForestError::InvalidParameter`] for a zero or
    /// oversized tree count; [`ForestError::PartitionFailure`] when some
    /// range cannot be split (e.g. all descriptors identical). A failed
    /// build returns no forest.
    pub fn build(descriptors: Vec<Descriptor>, params: &ForestParams) -> Result<Self> {
        if descriptors.len() >= MAX_DESCRIPTOR_COUNT {
            return Err(ForestError::CapacityExceeded(descriptors.len()));
        }
        if params.tree_count == 0 {
            return Err(ForestError::InvalidParameter(
                "tree_count must be at least 1".to_string(),
            ));
        }
        if params.tree_count > u32::from(u16::MAX) {
            return Err(ForestError::InvalidParameter(format!(
                "tree_count {} does not fit the 16-bit tree id",
                params.tree_count
            )));
        }

        let split_dims = split_dimensions(&descriptors);
        let trees = if descriptors.is_empty() {
            Vec::new()
        } else {
            let seed = params.seed.unwrap_or_else(|| rand::rng().random());
            let mut rng = StdRng::seed_from_u64(seed);
            let tree_seeds: Vec<u64> =
                (0..params.tree_count).map(|_| rng.random()).collect();
            tree_seeds
                .into_par_iter()
                .map(|tree_seed| {
                    KdTree::build(&descriptors, &split_dims, params.leaf_size, tree_seed)
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            descriptors,
            trees,
            split_dims,
            params: params.clone(),
        })
    }

    /// The indexed descriptor array.
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Number of indexed descriptors.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// The trees of the forest.
    #[must_use]
    pub fn trees(&self) -> &[KdTree] {
        &self.trees
    }

    /// The shared high-variance split-dimension set.
    #[must_use]
    pub fn split_dims(&self) -> &SplitDimensions {
        &self.split_dims
    }

    /// The parameters the forest was built with. `max_descriptors` is the
    /// configured default candidate budget for the `*_configured` query
    /// variants.
    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// The metric candidates are scored under.
    #[must_use]
    pub fn metric(&self) -> DistanceKind {
        self.params.metric
    }
}
