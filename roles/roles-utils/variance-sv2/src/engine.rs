//! Multi-miner variance engine.
//!
//! Owns one [`SampleStore`] per miner, each behind its own mutex. The poller
//! records into a miner's store while dashboard and logger tasks query it
//! concurrently; a miner's lock is only held for the duration of one append
//! or one window computation. Nothing is cached, every query is recomputed
//! from the buffer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::types::{HistoryPoint, WindowResult};
use crate::window_stats;
use crate::windowing::{SampleStore, DEFAULT_RETENTION_SECONDS};

/// Windows queried after every record unless configured otherwise.
pub const DEFAULT_WINDOWS: [u64; 3] = [60, 300, 600];

type SharedStore = Arc<Mutex<SampleStore>>;

#[derive(Debug)]
pub struct VarianceEngine {
    stores: RwLock<HashMap<String, SharedStore>>,
    windows: Vec<u64>,
    retention_seconds: u64,
}

impl VarianceEngine {
    /// Create an engine answering `windows` with `retention_seconds` of history per miner.
    pub fn new(windows: Vec<u64>, retention_seconds: u64) -> Self {
        assert!(!windows.is_empty(), "at least one window must be configured");
        assert!(
            windows.iter().all(|&w| w > 0),
            "window_seconds must be positive"
        );
        assert!(retention_seconds > 0, "retention horizon must be positive");

        Self {
            stores: RwLock::new(HashMap::new()),
            windows,
            retention_seconds,
        }
    }

    /// The configured window set, in configuration order.
    pub fn windows(&self) -> &[u64] {
        &self.windows
    }

    pub fn retention_seconds(&self) -> u64 {
        self.retention_seconds
    }

    /// Record one observation for `miner`, creating its store on first use.
    ///
    /// Offline polls must not be recorded: a missing sample is not a zero sample.
    pub fn record(&self, miner: &str, timestamp: u64, value: f64, expected_value: f64) {
        let store = self.store_or_insert(miner);
        lock(&store).append(timestamp, value, expected_value);
    }

    /// Statistics for `miner` over `window_seconds`.
    ///
    /// A miner that was never recorded yields an empty result, not an error.
    pub fn query(&self, miner: &str, window_seconds: u64) -> WindowResult {
        assert!(window_seconds > 0, "window_seconds must be positive");
        match self.store(miner) {
            Some(store) => {
                let guard = lock(&store);
                window_stats::window_result(&guard, window_seconds)
            }
            None => WindowResult::empty(window_seconds),
        }
    }

    /// Results for every configured window, computed under a single lock so the
    /// windows describe the same buffer state.
    pub fn query_all(&self, miner: &str) -> Vec<WindowResult> {
        match self.store(miner) {
            Some(store) => {
                let guard = lock(&store);
                self.windows
                    .iter()
                    .map(|&w| window_stats::window_result(&guard, w))
                    .collect()
            }
            None => self
                .windows
                .iter()
                .map(|&w| WindowResult::empty(w))
                .collect(),
        }
    }

    /// Retained samples of `miner` within `window_seconds` of its newest sample.
    pub fn history(&self, miner: &str, window_seconds: u64) -> Vec<HistoryPoint> {
        let Some(store) = self.store(miner) else {
            return Vec::new();
        };
        let guard = lock(&store);
        let Some(cutoff) = window_stats::window_cutoff(&guard, window_seconds) else {
            return Vec::new();
        };
        let points: Vec<HistoryPoint> = guard.samples_since(cutoff).map(HistoryPoint::from).collect();
        points
    }

    /// Names of all miners recorded so far, sorted.
    pub fn miners(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Samples currently retained for `miner`.
    pub fn retained_samples(&self, miner: &str) -> usize {
        match self.store(miner) {
            Some(store) => {
                let guard = lock(&store);
                guard.len()
            }
            None => 0,
        }
    }

    fn store(&self, miner: &str) -> Option<SharedStore> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(miner)
            .cloned()
    }

    fn store_or_insert(&self, miner: &str) -> SharedStore {
        if let Some(store) = self.store(miner) {
            return store;
        }
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(miner.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SampleStore::new(self.retention_seconds))))
            .clone()
    }
}

impl Default for VarianceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOWS.to_vec(), DEFAULT_RETENTION_SECONDS)
    }
}

fn lock(store: &Mutex<SampleStore>) -> MutexGuard<'_, SampleStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
