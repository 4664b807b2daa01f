//! sylva: randomised KD-forest 2-NN matching for SIFT-style byte
//! descriptors.
//!
//! A CPU-side approximate nearest-neighbour engine for 128-byte feature
//! descriptors: a forest of randomised KD-trees, a best-bin-first search
//! that backtracks across every tree through a single priority queue, and
//! Lowe ratio-test matching on the two nearest neighbours.
//!
//! # Which knobs matter?
//!
//! | Knob | Effect |
//! |------|--------|
//! | `tree_count` | More trees raise recall for a fixed budget; build cost grows linearly. |
//! | `max_descriptors` | Per-query candidate budget: recall vs. query latency. |
//! | `leaf_size` | Larger leaves mean fewer heap pops but coarser pruning. |
//! | `seed` | Any fixed value makes builds bit-reproducible, parallel included. |
//!
//! # Usage
//!
//! ```rust
//! use sylva::{Descriptor, ForestParams, KdForest};
//!
//! # fn main() -> sylva::Result<()> {
//! // Descriptors normally come from a feature extractor; spread the
//! // toy data along one component so splits have something to bite on.
//! let descriptors: Vec<Descriptor> = (0..128u32)
//!     .map(|i| {
//!         let mut d = Descriptor::splat(0);
//!         d.0[0] = (i * 2) as u8;
//!         d
//!     })
//!     .collect();
//!
//! let params = ForestParams {
//!     tree_count: 2,
//!     leaf_size: 8,
//!     seed: Some(7),
//!     ..ForestParams::default()
//! };
//! let forest = KdForest::build(descriptors, &params)?;
//!
//! let mut query = Descriptor::splat(0);
//! query.0[0] = 100;
//! let best2 = forest.query_2nn(&query, 64);
//! assert_eq!(best2.nearest().map(|(i, _)| i), Some(50));
//! # Ok(())
//! # }
//! ```
//!
//! # Scope
//!
//! The crate indexes and matches descriptor arrays; producing them
//! (detection, description, image I/O) is the caller's business. There is
//! no on-disk format: forests are cheap to rebuild relative to extracting
//! the descriptors they index.

pub mod descriptor;
pub mod distance;
pub mod error;
pub mod kdforest;

pub use descriptor::{DESCRIPTOR_DIM, Descriptor};
pub use distance::{DistanceKind, l1_distance, l2_distance_squared};
pub use error::{ForestError, Result};
pub use kdforest::{
    Best2, BoundingBox, ForestParams, KdForest, KdTree, SPLIT_DIMENSION_COUNT, SplitDimensions,
    split_dimensions,
};
