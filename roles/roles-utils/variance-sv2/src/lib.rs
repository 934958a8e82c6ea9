//! Rolling-window hashrate variance and stability tracking for Bitaxe miners.
//!
//! Each poll records one sample per online miner into a bounded per-miner
//! buffer. Window statistics (plain spread, spread above and below the
//! expected hashrate, mean deviation) are recomputed from that buffer on
//! demand and reduced to a 0-100 stability score. Window results can also be
//! persisted for long-term analytics.

pub mod bucketing;
pub mod csv_log;
pub mod engine;
pub mod report;
pub mod stability;
pub mod storage;
pub mod tracker;
pub mod types;
pub mod window_stats;
pub mod windowing;

pub use engine::{VarianceEngine, DEFAULT_WINDOWS};
pub use stability::{combined_score, stability_score, variance_ratio, StabilityGrade};
pub use storage::{SqliteVarianceStorage, StorageError, VarianceStorage};
pub use tracker::VarianceTracker;
pub use types::{unix_timestamp, HistoryPoint, Sample, WindowResult};
pub use windowing::{SampleStore, DEFAULT_RETENTION_SECONDS};
