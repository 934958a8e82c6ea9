//! Sample and result types for rolling hashrate variance tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: u64 = 86_400;

/// One hashrate observation for one miner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in seconds
    pub timestamp: u64,

    /// Observed hashrate in GH/s
    pub value: f64,

    /// Baseline in effect when this sample was recorded (GH/s).
    /// Zero means no baseline was known at the time.
    pub expected_value: f64,
}

impl Sample {
    pub fn new(timestamp: u64, value: f64, expected_value: f64) -> Self {
        Self {
            timestamp,
            value,
            expected_value,
        }
    }

    /// Signed distance from the frozen baseline, `None` if the sample has no baseline.
    pub fn deviation(&self) -> Option<f64> {
        (self.expected_value > 0.0).then(|| self.value - self.expected_value)
    }
}

/// Deviation statistics split by direction relative to the expected baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalStats {
    /// Mean of all signed deviations
    pub mean_deviation: f64,

    /// Sample standard deviation (n-1) of deviations >= 0
    pub positive_std: Option<f64>,

    /// Sample standard deviation (n-1) of |deviation| for deviations < 0
    pub negative_std: Option<f64>,

    pub positive_count: usize,
    pub negative_count: usize,

    /// Samples in the window that carried a baseline
    pub total_count: usize,
}

/// Aggregates for one miner over one trailing window.
///
/// Never stored: every query recomputes it from the miner's sample buffer.
/// Field names on the wire follow the dashboard's JSON contract.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowResult {
    pub window_seconds: u64,
    pub sample_count: usize,
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    #[serde(rename = "positive_variance")]
    pub positive_deviation_std: Option<f64>,
    #[serde(rename = "negative_variance")]
    pub negative_deviation_std: Option<f64>,
    #[serde(rename = "avg_deviation")]
    pub mean_deviation: Option<f64>,
    pub positive_count: usize,
    pub negative_count: usize,
}

impl WindowResult {
    /// Result for a miner with no samples yet.
    pub fn empty(window_seconds: u64) -> Self {
        Self {
            window_seconds,
            ..Self::default()
        }
    }

    /// True when enough samples exist for the spread statistics.
    pub fn has_variance(&self) -> bool {
        self.variance.is_some()
    }

    pub fn apply_directional(&mut self, directional: Option<DirectionalStats>) {
        if let Some(d) = directional {
            self.mean_deviation = Some(d.mean_deviation);
            self.positive_deviation_std = d.positive_std;
            self.negative_deviation_std = d.negative_std;
            self.positive_count = d.positive_count;
            self.negative_count = d.negative_count;
        }
    }
}

/// A single point of in-memory hashrate history, used for charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Unix timestamp
    pub time: u64,
    pub hashrate: f64,
    pub expected_hashrate: f64,
    /// Zero when the sample carried no baseline
    pub deviation: f64,
}

impl From<&Sample> for HistoryPoint {
    fn from(sample: &Sample) -> Self {
        Self {
            time: sample.timestamp,
            hashrate: sample.value,
            expected_hashrate: sample.expected_value,
            deviation: sample.deviation().unwrap_or(0.0),
        }
    }
}

/// Get current Unix timestamp in seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Start of the UTC day containing `timestamp`.
pub fn utc_day_start(timestamp: u64) -> u64 {
    timestamp - timestamp % SECONDS_PER_DAY
}

/// Format a Unix timestamp in UTC with a chrono format string.
pub fn format_utc(timestamp: u64, fmt: &str) -> String {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format(fmt).to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
