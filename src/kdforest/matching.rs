//! Best-2 accumulation and ratio-test matching.
//!
//! The accumulator reduces a stream of `(distance, index)` pairs into the
//! two smallest *distinct* distances. Distinctness matters: a descriptor
//! reached through several trees arrives once per tree, and without the
//! duplicate guard an exact duplicate of the best match would collapse
//! both slots onto the same distance and blind the ratio test.
//!
//! [`Best2::combine`] merges accumulators fed from disjoint candidate
//! ranges, so candidate scoring can be split and reduced in any grouping.

use rayon::prelude::*;

use crate::descriptor::Descriptor;
use crate::distance::DistanceKind;
use crate::kdforest::KdForest;

/// The two smallest distinct distances seen, with their descriptor indices.
///
/// Invariants after any update sequence: `distance[0] < distance[1]` and,
/// when both are set, `index[0] != index[1]`. Unset slots hold
/// `(u32::MAX, None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Best2 {
    pub distance: [u32; 2],
    pub index: [Option<u32>; 2],
}

impl Best2 {
    /// Empty accumulator; also the identity for [`Best2::combine`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            distance: [u32::MAX; 2],
            index: [None; 2],
        }
    }

    /// Feed one scored candidate.
    ///
    /// A distance equal to the current best is discarded: slot 1 only ever
    /// holds a distance strictly greater than slot 0.
    #[inline]
    pub fn update(&mut self, d: u32, i: u32) {
        if d < self.distance[0] {
            self.distance[1] = self.distance[0];
            self.index[1] = self.index[0];
            self.distance[0] = d;
            self.index[0] = Some(i);
        } else if d != self.distance[0] && d < self.distance[1] {
            self.distance[1] = d;
            self.index[1] = Some(i);
        }
        debug_assert!(self.distance[0] < self.distance[1]);
        debug_assert!(self.index[0] != self.index[1] || self.index[0].is_none());
    }

    /// Merge two accumulators fed from disjoint candidate ranges.
    ///
    /// Picks the two smallest distinct distances across the four slots.
    /// When both bests are equal the left operand's index wins slot 0 and
    /// the smaller runner-up fills slot 1, preserving the distinctness
    /// rule. Associative, and commutative up to which index represents a
    /// tied distance.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mut r = Best2::new();
        if self.distance[0] == other.distance[0] {
            r.distance[0] = self.distance[0];
            r.index[0] = self.index[0];
            if self.distance[1] < other.distance[1] {
                r.distance[1] = self.distance[1];
                r.index[1] = self.index[1];
            } else {
                r.distance[1] = other.distance[1];
                r.index[1] = other.index[1];
            }
        } else if self.distance[0] < other.distance[0] {
            r.distance[0] = self.distance[0];
            r.index[0] = self.index[0];
            if other.distance[0] < self.distance[1] {
                r.distance[1] = other.distance[0];
                r.index[1] = other.index[0];
            } else {
                r.distance[1] = self.distance[1];
                r.index[1] = self.index[1];
            }
        } else {
            r.distance[0] = other.distance[0];
            r.index[0] = other.index[0];
            if self.distance[0] < other.distance[1] {
                r.distance[1] = self.distance[0];
                r.index[1] = self.index[0];
            } else {
                r.distance[1] = other.distance[1];
                r.index[1] = other.index[1];
            }
        }
        r
    }

    /// Best match as `(index, distance)`, if any candidate was fed.
    #[must_use]
    pub fn nearest(&self) -> Option<(u32, u32)> {
        self.index[0].map(|i| (i, self.distance[0]))
    }

    /// Runner-up as `(index, distance)`, if a second distinct distance was
    /// seen.
    #[must_use]
    pub fn second(&self) -> Option<(u32, u32)> {
        self.index[1].map(|i| (i, self.distance[1]))
    }
}

impl Default for Best2 {
    fn default() -> Self {
        Self::new()
    }
}

/// Ratio-test acceptance of a 2-NN result.
///
/// A lone candidate (no second distinct distance) is accepted outright;
/// otherwise the best index is accepted iff the metric's ratio test holds.
fn ratio_accept(metric: DistanceKind, best2: &Best2) -> Option<u32> {
    let i0 = best2.index[0]?;
    if best2.index[1].is_none() {
        return Some(i0);
    }
    metric
        .within_ratio(best2.distance[0], best2.distance[1])
        .then_some(i0)
}

impl KdForest {
    /// Match one query descriptor against the indexed set.
    ///
    /// Runs the budgeted candidate search, scores candidates exactly, and
    /// applies the ratio test. `None` means no acceptable match.
    #[must_use]
    pub fn match_one(&self, query: &Descriptor, max_descriptors: usize) -> Option<u32> {
        let best2 = self.query_2nn(query, max_descriptors);
        ratio_accept(self.metric(), &best2)
    }

    /// Match every query descriptor against the indexed set, in parallel.
    ///
    /// Element `k` is the accepted index for `queries[k]`, or `None` when
    /// the ratio test rejects. Matching with no descriptors on either side
    /// yields an empty vector.
    #[must_use]
    pub fn match_all(&self, queries: &[Descriptor], max_descriptors: usize) -> Vec<Option<u32>> {
        if self.descriptor_count() == 0 || queries.is_empty() {
            return Vec::new();
        }
        queries
            .par_iter()
            .map(|q| self.match_one(q, max_descriptors))
            .collect()
    }

    /// [`KdForest::match_all`] with the candidate budget the forest was
    /// configured with.
    #[must_use]
    pub fn match_all_configured(&self, queries: &[Descriptor]) -> Vec<Option<u32>> {
        self.match_all(queries, self.params().max_descriptors)
    }

    /// Exact reference matcher: scans every indexed descriptor per query.
    ///
    /// Same acceptance rules as [`KdForest::match_all`] with an unlimited
    /// budget; useful for recall measurements against the budgeted path.
    #[must_use]
    pub fn match_all_exact(&self, queries: &[Descriptor]) -> Vec<Option<u32>> {
        if self.descriptor_count() == 0 || queries.is_empty() {
            return Vec::new();
        }
        let metric = self.metric();
        queries
            .par_iter()
            .map(|q| {
                let mut acc = Best2::new();
                for (i, d) in self.descriptors().iter().enumerate() {
                    acc.update(metric.distance(q, d), i as u32);
                }
                ratio_accept(metric, &acc)
            })
            .collect()
    }
}
