//! Property-based tests for the rolling variance engine.
//!
//! Timestamps are generated as non-negative gaps from a start time so every
//! sequence is non-decreasing, which is what the poller produces.

use proptest::prelude::*;
use variance_sv2::window_stats::{
    count_in_window, directional_variance_in_window, std_dev_in_window, variance_in_window,
};
use variance_sv2::{stability_score, SampleStore, VarianceEngine};

fn samples() -> impl Strategy<Value = Vec<(u64, f64, f64)>> {
    prop::collection::vec(
        (0u64..120, 0.0f64..3000.0, prop_oneof![Just(0.0f64), 100.0f64..2000.0]),
        0..80,
    )
    .prop_map(|gaps| {
        let mut ts = 1_700_000_000u64;
        gaps.into_iter()
            .map(|(gap, value, expected)| {
                ts += gap;
                (ts, value, expected)
            })
            .collect()
    })
}

fn fill(retention: u64, samples: &[(u64, f64, f64)]) -> SampleStore {
    let mut store = SampleStore::new(retention);
    for &(ts, value, expected) in samples {
        store.append(ts, value, expected);
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_eviction_keeps_only_the_horizon(
        samples in samples(),
        retention in 1u64..1200,
    ) {
        let store = fill(retention, &samples);

        if let (Some(oldest), Some(latest)) = (store.oldest_timestamp(), store.latest_timestamp()) {
            assert!(oldest >= latest.saturating_sub(retention));
        }
        // Retained samples are ordered
        let ts: Vec<u64> = store.iter().map(|s| s.timestamp).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn prop_no_spread_below_two_samples(
        samples in samples(),
        window in 1u64..900,
    ) {
        let store = fill(600, &samples);
        let count = count_in_window(&store, window);

        if count < 2 {
            assert!(variance_in_window(&store, window).is_none());
            assert!(std_dev_in_window(&store, window).is_none());
            assert!(directional_variance_in_window(&store, window).is_none());
        } else {
            assert!(variance_in_window(&store, window).is_some());
        }
    }

    #[test]
    fn prop_spread_is_non_negative(
        samples in samples(),
        window in 1u64..900,
    ) {
        let store = fill(600, &samples);

        if let Some(variance) = variance_in_window(&store, window) {
            assert!(variance >= 0.0);
            let std_dev = std_dev_in_window(&store, window).unwrap();
            assert!(std_dev >= 0.0);
            assert!((std_dev * std_dev - variance).abs() <= 1e-6 * variance.max(1.0));
        }
        if let Some(stats) = directional_variance_in_window(&store, window) {
            assert!(stats.positive_std.map_or(true, |s| s >= 0.0));
            assert!(stats.negative_std.map_or(true, |s| s >= 0.0));
        }
    }

    #[test]
    fn prop_directional_counts_add_up(
        samples in samples(),
        window in 1u64..900,
    ) {
        let store = fill(600, &samples);

        if let Some(stats) = directional_variance_in_window(&store, window) {
            assert_eq!(stats.positive_count + stats.negative_count, stats.total_count);
            assert!(stats.total_count <= count_in_window(&store, window));
            assert_eq!(stats.positive_std.is_some(), stats.positive_count >= 2);
            assert_eq!(stats.negative_std.is_some(), stats.negative_count >= 2);
        }
    }

    #[test]
    fn prop_surplus_only_has_no_downward_spread(
        readings in prop::collection::vec((0u64..10, 100.0f64..2000.0, 0.0f64..300.0), 2..40),
    ) {
        // Gaps stay under 400s in total, so every sample lands in the 600s window
        let mut store = SampleStore::new(600);
        let mut ts = 1_700_000_000u64;
        let mut deviations = Vec::new();
        for &(gap, expected, surplus) in &readings {
            ts += gap;
            let value = expected + surplus;
            store.append(ts, value, expected);
            deviations.push(value - expected);
        }

        let stats = directional_variance_in_window(&store, 600).unwrap();
        assert_eq!(stats.negative_count, 0);
        assert_eq!(stats.negative_std, None);
        assert_eq!(stats.positive_count, readings.len());

        let n = deviations.len() as f64;
        let mean = deviations.iter().sum::<f64>() / n;
        let expected_std =
            (deviations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        let positive_std = stats.positive_std.unwrap();
        assert!((positive_std - expected_std).abs() <= 1e-9 * expected_std.max(1.0));
    }

    #[test]
    fn prop_wider_windows_contain_narrower(
        samples in samples(),
        narrow in 1u64..600,
        extra in 0u64..600,
    ) {
        let store = fill(1200, &samples);
        assert!(count_in_window(&store, narrow) <= count_in_window(&store, narrow + extra));
    }

    #[test]
    fn prop_queries_are_idempotent(samples in samples()) {
        let engine = VarianceEngine::default();
        for &(ts, value, expected) in &samples {
            engine.record("M1", ts, value, expected);
        }

        assert_eq!(engine.query_all("M1"), engine.query_all("M1"));
    }

    #[test]
    fn prop_score_is_bounded(
        samples in samples(),
        expected in -10.0f64..2000.0,
    ) {
        let engine = VarianceEngine::default();
        for &(ts, value, baseline) in &samples {
            engine.record("M1", ts, value, baseline);
        }

        for result in engine.query_all("M1") {
            let score = stability_score(&result, expected);
            assert!((0.0..=100.0).contains(&score));
            if expected <= 0.0 {
                assert_eq!(score, 0.0);
            }
        }
    }
}
