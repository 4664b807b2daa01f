//! Distance metrics over byte descriptors.
//!
//! This module provides the two exact metrics used when scoring candidate
//! descriptors, and the metric vocabulary shared by configuration and
//! matching. Both functions are pure and deterministic: the same inputs
//! produce bit-identical results on every platform and code path.
//!
//! ## Value ranges
//!
//! Components are bytes, so L1 distance is bounded by `128 * 255 = 32640`
//! and fits in 16 bits; the candidate search relies on this bound to pack
//! its priority-queue entries. Squared L2 is bounded by `128 * 255^2` and
//! fits comfortably in a `u32`.

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;

/// Distance metric for descriptor scoring.
///
/// The candidate enumerator always drives its priority queue with the L1
/// bounding-box lower bound; this choice only affects how enumerated
/// candidates are scored and how the ratio test is thresholded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceKind {
    /// Sum of absolute component differences.
    L1,
    /// Sum of squared component differences.
    L2Squared,
}

impl DistanceKind {
    /// Compute the distance between two descriptors under this metric.
    #[inline]
    #[must_use]
    pub fn distance(self, a: &Descriptor, b: &Descriptor) -> u32 {
        match self {
            DistanceKind::L1 => l1_distance(a, b),
            DistanceKind::L2Squared => l2_distance_squared(a, b),
        }
    }

    /// Lowe ratio test: does `d0 / d1` fall below the 0.8 threshold?
    ///
    /// Integer form of `d0 / d1 < 0.8`, squared for the squared metric:
    /// `d0 * 25 < d1 * 16` for L1 and `d0 * 100 < d1 * 64` for L2².
    #[inline]
    #[must_use]
    pub fn within_ratio(self, d0: u32, d1: u32) -> bool {
        let (d0, d1) = (u64::from(d0), u64::from(d1));
        match self {
            DistanceKind::L1 => d0 * 25 < d1 * 16,
            DistanceKind::L2Squared => d0 * 100 < d1 * 64,
        }
    }
}

/// L1 (taxicab) distance between two descriptors.
#[inline]
#[must_use]
pub fn l1_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| (i32::from(x) - i32::from(y)).unsigned_abs())
        .sum()
}

/// Squared L2 (Euclidean) distance between two descriptors.
#[inline]
#[must_use]
pub fn l2_distance_squared(a: &Descriptor, b: &Descriptor) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}
