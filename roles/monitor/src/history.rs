//! Operating history kept next to the hashrate samples.
//!
//! The variance engine only stores hashrate and baseline. Charts also plot
//! hashrate efficiency and core voltage, so those are kept here per miner,
//! keyed by the same tick timestamp and bounded by the same retention.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use variance_sv2::HistoryPoint;

/// Points shown in a debug report.
pub const DEBUG_SAMPLE_POINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperatingPoint {
    pub timestamp: u64,
    /// Hashrate over expected hashrate, percent
    pub efficiency_pct: f64,
    pub voltage_v: f64,
}

/// Per-miner ring of [`OperatingPoint`]s, evicted relative to each miner's newest point.
#[derive(Debug)]
pub struct OperatingHistory {
    retention_secs: u64,
    points: HashMap<String, VecDeque<OperatingPoint>>,
}

impl OperatingHistory {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            retention_secs,
            points: HashMap::new(),
        }
    }

    pub fn record(&mut self, miner: &str, point: OperatingPoint) {
        let ring = self.points.entry(miner.to_string()).or_default();
        match ring.back() {
            Some(last) if point.timestamp < last.timestamp => {
                let position = ring.partition_point(|p| p.timestamp <= point.timestamp);
                ring.insert(position, point);
            }
            _ => ring.push_back(point),
        }

        if let Some(latest) = ring.back().map(|p| p.timestamp) {
            let cutoff = latest.saturating_sub(self.retention_secs);
            while ring.front().is_some_and(|p| p.timestamp < cutoff) {
                ring.pop_front();
            }
        }
    }

    /// Point recorded at exactly `timestamp`.
    pub fn at(&self, miner: &str, timestamp: u64) -> Option<OperatingPoint> {
        let ring = self.points.get(miner)?;
        let index = ring.partition_point(|p| p.timestamp < timestamp);
        ring.get(index).filter(|p| p.timestamp == timestamp).copied()
    }

    pub fn len(&self, miner: &str) -> usize {
        self.points.get(miner).map_or(0, VecDeque::len)
    }
}

/// One chart point: the engine's hashrate sample plus efficiency and voltage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    #[serde(flatten)]
    pub sample: HistoryPoint,
    /// Zero when no operating point was recorded at this time
    pub efficiency: f64,
    pub voltage: f64,
}

impl ChartPoint {
    pub fn merge(sample: HistoryPoint, operating: Option<OperatingPoint>) -> Self {
        let (efficiency, voltage) = operating.map_or((0.0, 0.0), |p| (p.efficiency_pct, p.voltage_v));
        Self {
            sample,
            efficiency,
            voltage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Raw view of a miner's chart history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugReport {
    pub miner: String,
    pub data_points: usize,
    pub efficiency_values: Vec<f64>,
    pub efficiency_range: EfficiencyRange,
    /// The oldest few points
    pub sample_data: Vec<ChartPoint>,
}

impl DebugReport {
    /// `None` when there is no history for `miner`.
    pub fn from_points(miner: &str, points: &[ChartPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let efficiency_values: Vec<f64> = points.iter().map(|p| p.efficiency).collect();
        let min = efficiency_values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = efficiency_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = efficiency_values.iter().sum::<f64>() / efficiency_values.len() as f64;

        Some(Self {
            miner: miner.to_string(),
            data_points: points.len(),
            efficiency_values,
            efficiency_range: EfficiencyRange { min, max, avg },
            sample_data: points.iter().take(DEBUG_SAMPLE_POINTS).cloned().collect(),
        })
    }
}
