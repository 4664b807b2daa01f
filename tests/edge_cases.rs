//! Edge case tests for sylva.
//!
//! Tests unusual inputs and boundary conditions that could cause failures,
//! plus the concrete end-to-end matching scenarios.

use sylva::{
    DESCRIPTOR_DIM, Descriptor, DistanceKind, ForestError, ForestParams, KdForest,
};

/// Deterministic pseudo-random descriptors (xorshift fill).
fn scrambled_descriptors(count: usize, mut state: u64) -> Vec<Descriptor> {
    (0..count)
        .map(|_| {
            let mut d = Descriptor::splat(0);
            for k in 0..DESCRIPTOR_DIM {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                d.0[k] = (state >> 32) as u8;
            }
            d
        })
        .collect()
}

/// Descriptors spread along component 0 only: `desc[i][0] = i`.
fn ramp_descriptors(count: usize) -> Vec<Descriptor> {
    (0..count)
        .map(|i| {
            let mut d = Descriptor::splat(0);
            d.0[0] = i as u8;
            d
        })
        .collect()
}

fn leaf_serialisation(forest: &KdForest) -> Vec<Vec<u32>> {
    forest
        .trees()
        .iter()
        .flat_map(|t| t.leaves().map(<[u32]>::to_vec))
        .collect()
}

// =============================================================================
// Concrete matching scenarios
// =============================================================================

#[test]
fn three_point_dataset_finds_the_ordered_pair() {
    let descriptors = vec![
        Descriptor::splat(0),
        Descriptor::splat(128),
        Descriptor::splat(255),
    ];
    let params = ForestParams {
        tree_count: 1,
        leaf_size: 4,
        seed: Some(1),
        ..ForestParams::default()
    };
    let forest = KdForest::build(descriptors, &params).expect("build");

    let best2 = forest.query_2nn(&Descriptor::splat(0), 3);
    assert_eq!(best2.nearest().map(|(i, _)| i), Some(0));
    assert_eq!(best2.second().map(|(i, _)| i), Some(1));
}

#[test]
fn ramp_dataset_matches_the_exact_neighbour() {
    let descriptors = ramp_descriptors(256);
    let params = ForestParams {
        tree_count: 4,
        leaf_size: 8,
        seed: Some(99),
        metric: DistanceKind::L1,
        ..ForestParams::default()
    };
    let forest = KdForest::build(descriptors, &params).expect("build");

    let mut q = Descriptor::splat(0);
    q.0[0] = 42;
    let best2 = forest.query_2nn(&q, 32);

    assert_eq!(best2.nearest(), Some((42, 0)));
    let (i1, d1) = best2.second().expect("a runner-up exists");
    assert!(i1 == 41 || i1 == 43, "runner-up was {i1}");
    assert_eq!(d1, 1);

    // d0 = 0, d1 = 1: the ratio test accepts.
    assert_eq!(forest.match_one(&q, 32), Some(42));
    assert_eq!(forest.match_all_configured(&[q]), vec![Some(42)]);
}

#[test]
fn duplicate_best_distances_stay_distinct_in_the_accumulator() {
    // Two exact copies of the query at indices 0 and 1.
    let mut q = Descriptor::splat(0);
    q.0[5] = 200;
    q.0[77] = 31;
    let mut descriptors = vec![q, q];
    descriptors.extend(scrambled_descriptors(40, 0xfeed));

    let params = ForestParams {
        tree_count: 2,
        leaf_size: 4,
        seed: Some(3),
        ..ForestParams::default()
    };
    let forest = KdForest::build(descriptors, &params).expect("build");

    let best2 = forest.query_2nn(&q, usize::MAX);
    // The second zero is discarded; slot 1 holds the next distinct distance.
    assert_eq!(best2.distance[0], 0);
    assert!(best2.distance[1] > 0);
    let (i0, i1) = (best2.index[0].unwrap(), best2.index[1].unwrap());
    assert!(i0 < 2, "best slot must hold one of the duplicates");
    assert_ne!(i0, i1);
    assert!(i1 >= 2, "runner-up must be a non-duplicate");

    // With d0 = 0 the ratio passes and the first duplicate is matched.
    assert_eq!(forest.match_one(&q, usize::MAX), Some(i0));
}

#[test]
fn identical_descriptors_refuse_to_partition() {
    let descriptors = vec![Descriptor::splat(111); 200];
    let params = ForestParams {
        tree_count: 2,
        leaf_size: 8,
        seed: Some(4),
        ..ForestParams::default()
    };
    let err = KdForest::build(descriptors, &params).unwrap_err();
    assert!(matches!(err, ForestError::PartitionFailure { .. }));
}

#[test]
fn same_seed_rebuilds_the_same_forest() {
    let descriptors = scrambled_descriptors(256, 0xabcdef);
    let params = ForestParams {
        tree_count: 3,
        leaf_size: 8,
        seed: Some(21),
        ..ForestParams::default()
    };
    let first = KdForest::build(descriptors.clone(), &params).expect("build");
    let second = KdForest::build(descriptors.clone(), &params).expect("build");
    assert_eq!(leaf_serialisation(&first), leaf_serialisation(&second));

    let other_params = ForestParams {
        seed: Some(22),
        ..params
    };
    let third = KdForest::build(descriptors, &other_params).expect("build");
    assert_ne!(leaf_serialisation(&first), leaf_serialisation(&third));
}

#[test]
fn budgeted_matching_agrees_with_exact_scan_when_exhaustive() {
    let descriptors = scrambled_descriptors(300, 0x5eed);
    let queries = scrambled_descriptors(40, 0xbeef);
    let params = ForestParams {
        tree_count: 3,
        leaf_size: 8,
        seed: Some(7),
        ..ForestParams::default()
    };
    let forest = KdForest::build(descriptors.clone(), &params).expect("build");

    let budgeted = forest.match_all(&queries, usize::MAX);
    let exact = forest.match_all_exact(&queries);
    assert_eq!(budgeted.len(), exact.len());
    for (q, (a, b)) in queries.iter().zip(budgeted.iter().zip(&exact)) {
        // Acceptance depends only on the two distances, which are
        // order-independent; the index may differ when distances tie.
        assert_eq!(a.is_some(), b.is_some());
        if let (Some(i), Some(j)) = (a, b) {
            let metric = forest.metric();
            assert_eq!(
                metric.distance(q, &descriptors[*i as usize]),
                metric.distance(q, &descriptors[*j as usize]),
            );
        }
    }

    // Spot-check one query against a hand-rolled scan.
    let q = &queries[0];
    let best2 = forest.query_2nn(q, usize::MAX);
    let min_distance = descriptors
        .iter()
        .map(|d| forest.metric().distance(q, d))
        .min()
        .unwrap();
    assert_eq!(best2.distance[0], min_distance);
}

// =============================================================================
// Empty and degenerate inputs
// =============================================================================

#[test]
fn empty_dataset_builds_an_empty_forest() {
    let forest = KdForest::build(Vec::new(), &ForestParams::default()).expect("build");
    assert_eq!(forest.descriptor_count(), 0);
    assert!(forest.trees().is_empty());

    let q = Descriptor::splat(0);
    assert!(forest.query_2nn_leaves(&q, 100).is_empty());
    assert_eq!(forest.query_2nn(&q, 100).nearest(), None);
    assert!(forest.match_all(&[q], 100).is_empty());
    assert!(forest.match_all_configured(&[q]).is_empty());
}

#[test]
fn empty_query_set_yields_no_matches() {
    let descriptors = scrambled_descriptors(50, 0x77);
    let forest = KdForest::build(
        descriptors,
        &ForestParams {
            seed: Some(5),
            ..ForestParams::default()
        },
    )
    .expect("build");
    assert!(forest.match_all(&[], 100).is_empty());
    assert!(forest.match_all_exact(&[]).is_empty());
}

#[test]
fn zero_budget_enumerates_nothing() {
    let descriptors = scrambled_descriptors(50, 0x88);
    let forest = KdForest::build(
        descriptors,
        &ForestParams {
            seed: Some(6),
            ..ForestParams::default()
        },
    )
    .expect("build");
    let q = Descriptor::splat(0);
    assert!(forest.query_2nn_leaves(&q, 0).is_empty());
    assert_eq!(forest.query_2nn(&q, 0).nearest(), None);
}

#[test]
fn single_descriptor_matches_without_a_runner_up() {
    let descriptors = vec![Descriptor::splat(60)];
    let params = ForestParams {
        tree_count: 2,
        seed: Some(8),
        ..ForestParams::default()
    };
    let forest = KdForest::build(descriptors, &params).expect("build");

    let best2 = forest.query_2nn(&Descriptor::splat(61), usize::MAX);
    assert_eq!(best2.nearest().map(|(i, _)| i), Some(0));
    assert_eq!(best2.second(), None);
    // A lone candidate is accepted outright.
    assert_eq!(forest.match_one(&Descriptor::splat(61), usize::MAX), Some(0));
}

#[test]
fn zero_tree_count_is_rejected() {
    let params = ForestParams {
        tree_count: 0,
        ..ForestParams::default()
    };
    let err = KdForest::build(scrambled_descriptors(10, 1), &params).unwrap_err();
    assert!(matches!(err, ForestError::InvalidParameter(_)));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn params_round_trip_through_serde() {
    let params = ForestParams {
        tree_count: 6,
        leaf_size: 16,
        max_descriptors: 768,
        seed: Some(42),
        metric: DistanceKind::L1,
    };
    let json = serde_json::to_string(&params).unwrap();
    let parsed: ForestParams = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, params);
}
