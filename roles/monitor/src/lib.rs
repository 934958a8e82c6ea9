//! Bitaxe fleet monitor: polls every miner on the LAN, tracks rolling
//! hashrate variance, logs to CSV and SQLite and serves a live dashboard.

pub mod api;
pub mod collector;
pub mod config;
pub mod csv_logger;
pub mod display;
pub mod history;
pub mod metrics;

pub use collector::{MetricsCollector, MonotonicClock};
pub use history::{ChartPoint, DebugReport};
pub use metrics::{FleetSummary, MinerMetrics, MinerStatus, WindowSnapshot};
