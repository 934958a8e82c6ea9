//! Stateless statistics over the trailing window of a `SampleStore`.
//!
//! "Now" for every window is the timestamp of the newest sample in the store,
//! so replaying recorded data gives the same answers as the live monitor.
//!
//! Two variance conventions coexist on purpose:
//! - the plain hashrate variance and std-dev divide by `n` (population),
//! - the directional above/below-baseline spreads divide by `n - 1` (sample).
//!
//! Dashboards and stored history already display numbers computed this way.

use crate::types::{DirectionalStats, Sample, WindowResult};
use crate::windowing::SampleStore;

/// First timestamp inside the window, or `None` for an empty store.
///
/// Panics on a zero-length window.
pub fn window_cutoff(store: &SampleStore, window_seconds: u64) -> Option<u64> {
    assert!(window_seconds > 0, "window_seconds must be positive");
    store
        .latest_timestamp()
        .map(|latest| latest.saturating_sub(window_seconds))
}

fn samples_in_window(store: &SampleStore, window_seconds: u64) -> Vec<&Sample> {
    match window_cutoff(store, window_seconds) {
        Some(cutoff) => store.samples_since(cutoff).collect(),
        None => Vec::new(),
    }
}

/// Number of samples within `window_seconds` of the newest sample.
pub fn count_in_window(store: &SampleStore, window_seconds: u64) -> usize {
    match window_cutoff(store, window_seconds) {
        Some(cutoff) => store.samples_since(cutoff).count(),
        None => 0,
    }
}

/// Population variance of hashrate in the window; `None` below two samples.
pub fn variance_in_window(store: &SampleStore, window_seconds: u64) -> Option<f64> {
    let values: Vec<f64> = samples_in_window(store, window_seconds)
        .into_iter()
        .map(|s| s.value)
        .collect();
    population_variance(&values)
}

/// Non-negative square root of [`variance_in_window`].
pub fn std_dev_in_window(store: &SampleStore, window_seconds: u64) -> Option<f64> {
    variance_in_window(store, window_seconds).map(f64::sqrt)
}

/// Deviation from the frozen per-sample baseline, split by direction.
///
/// Only samples recorded with a positive baseline take part. Returns `None`
/// when fewer than two such samples are in the window.
pub fn directional_variance_in_window(
    store: &SampleStore,
    window_seconds: u64,
) -> Option<DirectionalStats> {
    let deviations: Vec<f64> = samples_in_window(store, window_seconds)
        .into_iter()
        .filter_map(Sample::deviation)
        .collect();

    if deviations.len() < 2 {
        return None;
    }

    let (positive, negative): (Vec<f64>, Vec<f64>) =
        deviations.iter().partition(|&&d| d >= 0.0);
    let negative: Vec<f64> = negative.into_iter().map(f64::abs).collect();

    Some(DirectionalStats {
        mean_deviation: mean(&deviations),
        positive_std: sample_std_dev(&positive),
        negative_std: sample_std_dev(&negative),
        positive_count: positive.len(),
        negative_count: negative.len(),
        total_count: deviations.len(),
    })
}

/// Everything a dashboard shows for one window, computed in one pass over the store.
pub fn window_result(store: &SampleStore, window_seconds: u64) -> WindowResult {
    let variance = variance_in_window(store, window_seconds);
    let mut result = WindowResult {
        window_seconds,
        sample_count: count_in_window(store, window_seconds),
        variance,
        std_dev: variance.map(f64::sqrt),
        ..WindowResult::default()
    };
    result.apply_directional(directional_variance_in_window(store, window_seconds));
    result
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sum_squared_error(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum()
}

fn population_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(sum_squared_error(values) / values.len() as f64)
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some((sum_squared_error(values) / (values.len() - 1) as f64).sqrt())
}
