//! Stability scoring.
//!
//! The score is a heuristic, not a statistic: it starts at 100, loses two
//! points per percent of mean deviation from the expected baseline, and loses
//! up to 50 more for the average directional spread. Dashboards and reports
//! colour miners by the fixed thresholds below, so the formula is kept as is.

use serde::{Deserialize, Serialize};

use crate::types::WindowResult;

/// Scores at or above this are shown as healthy.
pub const GOOD_THRESHOLD: f64 = 80.0;

/// Scores at or above this (and below [`GOOD_THRESHOLD`]) are shown as a warning.
pub const WARNING_THRESHOLD: f64 = 60.0;

const DEVIATION_WEIGHT: f64 = 2.0;
const MAX_VARIANCE_PENALTY: f64 = 50.0;

/// Reduce one window's result to a 0-100 score against `expected_value`.
///
/// Without a baseline there is nothing to be stable against, so the score is 0.
/// A window without directional data scores as if the mean deviation were zero.
pub fn stability_score(result: &WindowResult, expected_value: f64) -> f64 {
    if !(expected_value > 0.0) {
        return 0.0;
    }

    let deviation_pct = result.mean_deviation.unwrap_or(0.0).abs() / expected_value * 100.0;
    let mut score = (100.0 - deviation_pct * DEVIATION_WEIGHT).max(0.0);

    if let (Some(positive), Some(negative)) =
        (result.positive_deviation_std, result.negative_deviation_std)
    {
        let avg_variance_pct = (positive + negative) / 2.0 / expected_value * 100.0;
        score = (score - avg_variance_pct.min(MAX_VARIANCE_PENALTY)).max(0.0);
    }

    round_to_tenth(score.min(100.0))
}

/// Mean of the per-window scores that had variance data, rounded like a single score.
pub fn combined_score(results: &[WindowResult], expected_value: f64) -> Option<f64> {
    let scores: Vec<f64> = results
        .iter()
        .filter(|r| r.has_variance())
        .map(|r| stability_score(r, expected_value))
        .collect();

    if scores.is_empty() {
        return None;
    }
    Some(round_to_tenth(scores.iter().sum::<f64>() / scores.len() as f64))
}

/// Ratio of upward to downward spread.
///
/// Infinite when only upward spread exists, zero when there is no upward spread.
pub fn variance_ratio(positive: Option<f64>, negative: Option<f64>) -> f64 {
    match (positive, negative) {
        (Some(p), Some(n)) if n > 0.0 => p / n,
        (Some(p), _) if p > 0.0 => f64::INFINITY,
        _ => 0.0,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Display bucket for a stability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityGrade {
    Good,
    Warning,
    Danger,
}

impl StabilityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= GOOD_THRESHOLD {
            StabilityGrade::Good
        } else if score >= WARNING_THRESHOLD {
            StabilityGrade::Warning
        } else {
            StabilityGrade::Danger
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityGrade::Good => "good",
            StabilityGrade::Warning => "warning",
            StabilityGrade::Danger => "danger",
        }
    }
}
