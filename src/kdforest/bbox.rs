//! Axis-aligned bounds and split-dimension analysis.
//!
//! Every tree node carries the bounding box of the descriptors below it;
//! the box's L1 lower bound is what orders the best-bin-first priority
//! queue. The split-dimension set is computed once per dataset and shared
//! by every tree of a forest.

use crate::descriptor::{DESCRIPTOR_DIM, Descriptor};

/// Number of high-variance dimensions splits are drawn from.
pub const SPLIT_DIMENSION_COUNT: usize = 5;

/// Component-wise extrema of a set of descriptors.
///
/// Invariant: `min[i] <= max[i]` for every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub min: Descriptor,
    pub max: Descriptor,
}

impl BoundingBox {
    /// Bounding box of the descriptors selected by `indices`.
    #[must_use]
    pub fn of(descriptors: &[Descriptor], indices: &[u32]) -> Self {
        debug_assert!(!indices.is_empty());
        let mut min = [u8::MAX; DESCRIPTOR_DIM];
        let mut max = [0u8; DESCRIPTOR_DIM];
        for &i in indices {
            let d = descriptors[i as usize].as_bytes();
            for k in 0..DESCRIPTOR_DIM {
                min[k] = min[k].min(d[k]);
                max[k] = max[k].max(d[k]);
            }
        }
        Self {
            min: Descriptor(min),
            max: Descriptor(max),
        }
    }

    /// Smallest box containing both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut min = [0u8; DESCRIPTOR_DIM];
        let mut max = [0u8; DESCRIPTOR_DIM];
        for k in 0..DESCRIPTOR_DIM {
            min[k] = self.min.0[k].min(other.min.0[k]);
            max[k] = self.max.0[k].max(other.max.0[k]);
        }
        Self {
            min: Descriptor(min),
            max: Descriptor(max),
        }
    }

    /// Lower bound on the L1 distance from `q` to any point inside the box.
    ///
    /// Per component: `max(min - q, q - max, 0)`. Zero when `q` lies inside
    /// the box. Admissible: never exceeds the true L1 distance to any
    /// descriptor the box contains, which is what makes the priority-queue
    /// ordering sound.
    #[inline]
    #[must_use]
    pub fn l1_lower_bound(&self, q: &Descriptor) -> u32 {
        let mut sum = 0u32;
        for k in 0..DESCRIPTOR_DIM {
            let v = q.0[k];
            if v < self.min.0[k] {
                sum += u32::from(self.min.0[k] - v);
            } else if v > self.max.0[k] {
                sum += u32::from(v - self.max.0[k]);
            }
        }
        sum
    }

    /// Does the box contain `d` component-wise?
    #[must_use]
    pub fn contains(&self, d: &Descriptor) -> bool {
        (0..DESCRIPTOR_DIM).all(|k| self.min.0[k] <= d.0[k] && d.0[k] <= self.max.0[k])
    }
}

/// The dimensions every split is drawn from: the `SPLIT_DIMENSION_COUNT`
/// highest-variance components of the dataset, ties broken by lower index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitDimensions([u8; SPLIT_DIMENSION_COUNT]);

impl SplitDimensions {
    /// The selected dimension indices, highest variance first.
    #[must_use]
    pub fn dims(&self) -> &[u8; SPLIT_DIMENSION_COUNT] {
        &self.0
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> u8 {
        self.0[i]
    }
}

/// Select the highest-variance dimensions of the dataset.
///
/// Variances are compared through the integer-exact scaled form
/// `n * sum(x^2) - sum(x)^2`, so the selection is deterministic and free of
/// rounding. Ties go to the lower dimension index.
#[must_use]
pub fn split_dimensions(descriptors: &[Descriptor]) -> SplitDimensions {
    let mut sum = [0u64; DESCRIPTOR_DIM];
    let mut sum_sq = [0u64; DESCRIPTOR_DIM];
    for d in descriptors {
        for (k, &v) in d.as_bytes().iter().enumerate() {
            let v = u64::from(v);
            sum[k] += v;
            sum_sq[k] += v * v;
        }
    }

    let n = descriptors.len() as u128;
    let variance =
        |k: usize| n * u128::from(sum_sq[k]) - u128::from(sum[k]) * u128::from(sum[k]);

    let mut order: Vec<u8> = (0..DESCRIPTOR_DIM as u8).collect();
    order.sort_by(|&a, &b| {
        variance(b as usize)
            .cmp(&variance(a as usize))
            .then(a.cmp(&b))
    });

    let mut dims = [0u8; SPLIT_DIMENSION_COUNT];
    dims.copy_from_slice(&order[..SPLIT_DIMENSION_COUNT]);
    SplitDimensions(dims)
}
