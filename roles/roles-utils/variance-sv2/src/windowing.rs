//! Per-miner sample buffer with time-based retention.
//!
//! A `SampleStore` keeps the recent hashrate samples of a single miner in
//! timestamp order and discards anything older than its retention horizon on
//! every append, so memory stays bounded no matter how often the poller records.
//! The horizon is measured from the newest sample in the store, never from the
//! wall clock.

use std::collections::VecDeque;

use crate::types::Sample;

/// Default retention horizon: ten minutes of samples.
pub const DEFAULT_RETENTION_SECONDS: u64 = 600;

/// Time-ordered sample buffer for one miner.
///
/// # Example
/// ```ignore
/// let mut store = SampleStore::new(600);
/// store.append(1_000, 1195.0, 1200.0);
/// store.append(1_030, 1203.0, 1200.0);
/// assert_eq!(store.samples_since(1_010).count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: VecDeque<Sample>,
    retention_seconds: u64,
}

impl SampleStore {
    /// Create an empty store keeping `retention_seconds` of history.
    pub fn new(retention_seconds: u64) -> Self {
        assert!(retention_seconds > 0, "retention horizon must be positive");
        Self {
            samples: VecDeque::new(),
            retention_seconds,
        }
    }

    /// Append a sample and evict everything older than the retention horizon.
    ///
    /// Timestamps are expected to be non-decreasing. A slightly late sample is
    /// inserted at its ordered position; one that is already older than the
    /// retention cutoff means the caller's clock went badly backwards and panics.
    pub fn append(&mut self, timestamp: u64, value: f64, expected_value: f64) {
        let sample = Sample::new(timestamp, value, expected_value);

        match self.latest_timestamp() {
            Some(latest) if timestamp < latest => {
                let cutoff = latest.saturating_sub(self.retention_seconds);
                assert!(
                    timestamp >= cutoff,
                    "sample timestamp {} is older than the retention cutoff {} (latest {})",
                    timestamp,
                    cutoff,
                    latest
                );
                let position = self.samples.partition_point(|s| s.timestamp <= timestamp);
                self.samples.insert(position, sample);
            }
            _ => self.samples.push_back(sample),
        }

        self.evict_expired();
    }

    fn evict_expired(&mut self) {
        let Some(latest) = self.latest_timestamp() else {
            return;
        };
        let cutoff = latest.saturating_sub(self.retention_seconds);
        while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
    }

    /// Samples with `timestamp >= cutoff`, oldest first. Does not consume the buffer.
    pub fn samples_since(&self, cutoff: u64) -> impl Iterator<Item = &Sample> + '_ {
        let start = self.samples.partition_point(|s| s.timestamp < cutoff);
        self.samples.range(start..)
    }

    /// Timestamp of the newest sample; the reference "now" for every window.
    pub fn latest_timestamp(&self) -> Option<u64> {
        self.samples.back().map(|s| s.timestamp)
    }

    pub fn oldest_timestamp(&self) -> Option<u64> {
        self.samples.front().map(|s| s.timestamp)
    }

    pub fn retention_seconds(&self) -> u64 {
        self.retention_seconds
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let mut store = SampleStore::new(600);
        store.append(100, 1200.0, 1200.0);
        store.append(130, 1205.0, 1200.0);

        assert_eq!(store.len(), 2);
        assert_eq!(store.latest_timestamp(), Some(130));
        let values: Vec<f64> = store.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1200.0, 1205.0]);
    }

    #[test]
    fn test_eviction_spanning_more_than_horizon() {
        let mut store = SampleStore::new(600);
        for ts in (0..=700).step_by(10) {
            store.append(ts, 1000.0, 1200.0);
        }

        let oldest = store.oldest_timestamp().unwrap();
        assert_eq!(oldest, 100);
        assert!(oldest >= 700 - 600);
        assert_eq!(store.len(), 61);
    }

    #[test]
    fn test_sample_exactly_at_cutoff_is_kept() {
        let mut store = SampleStore::new(60);
        store.append(0, 1.0, 0.0);
        store.append(60, 2.0, 0.0);
        assert_eq!(store.len(), 2);

        store.append(61, 3.0, 0.0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.oldest_timestamp(), Some(60));
    }

    #[test]
    fn test_samples_since_is_restartable() {
        let mut store = SampleStore::new(600);
        for ts in [10, 20, 30, 40] {
            store.append(ts, ts as f64, 0.0);
        }

        let first: Vec<u64> = store.samples_since(25).map(|s| s.timestamp).collect();
        let second: Vec<u64> = store.samples_since(25).map(|s| s.timestamp).collect();
        assert_eq!(first, vec![30, 40]);
        assert_eq!(first, second);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_late_sample_is_inserted_in_order() {
        let mut store = SampleStore::new(600);
        store.append(100, 1.0, 0.0);
        store.append(200, 2.0, 0.0);
        store.append(150, 1.5, 0.0);

        let order: Vec<u64> = store.iter().map(|s| s.timestamp).collect();
        assert_eq!(order, vec![100, 150, 200]);
        assert_eq!(store.latest_timestamp(), Some(200));
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut store = SampleStore::new(600);
        store.append(100, 1.0, 0.0);
        store.append(100, 2.0, 0.0);
        let values: Vec<f64> = store.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "older than the retention cutoff")]
    fn test_sample_far_in_the_past_panics() {
        let mut store = SampleStore::new(600);
        store.append(10_000, 1.0, 0.0);
        store.append(1_000, 1.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "retention horizon must be positive")]
    fn test_zero_retention_panics() {
        let _ = SampleStore::new(0);
    }

    #[test]
    fn test_empty_store() {
        let store = SampleStore::default();
        assert!(store.is_empty());
        assert_eq!(store.latest_timestamp(), None);
        assert_eq!(store.samples_since(0).count(), 0);
        assert_eq!(store.retention_seconds(), DEFAULT_RETENTION_SECONDS);
    }
}
