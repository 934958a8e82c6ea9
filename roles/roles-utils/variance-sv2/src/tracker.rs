//! Long-term variance tracking: per-poll records into CSV and SQLite, a
//! daily rollup, analytics and text reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::csv_log::{optional_cell, CsvLog};
use crate::report::VarianceReport;
use crate::storage::{
    Result, SqliteVarianceStorage, StabilityPoint, VarianceAnalytics, VarianceRecord,
    VarianceStorage,
};
use crate::types::{format_utc, utc_day_start, WindowResult};

pub const TRACKING_CSV: &str = "variance_tracking.csv";
pub const ANALYTICS_DB: &str = "variance_analytics.db";

const SECONDS_PER_DAY: u64 = 86_400;

const TRACKING_HEADERS: [&str; 14] = [
    "timestamp",
    "miner_name",
    "window_seconds",
    "expected_hashrate_gh",
    "actual_hashrate_gh",
    "deviation_gh",
    "positive_variance",
    "negative_variance",
    "avg_deviation",
    "sample_count",
    "positive_count",
    "negative_count",
    "variance_ratio",
    "stability_score",
];

pub struct VarianceTracker {
    storage: Arc<dyn VarianceStorage>,
    csv: CsvLog,
    data_dir: PathBuf,
    /// Day start of the last UTC day seen by `log_miner_variance`
    last_day: Mutex<Option<u64>>,
}

impl VarianceTracker {
    /// Open the tracking CSV and the analytics database under `data_dir`.
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let storage = SqliteVarianceStorage::new(data_dir.join(ANALYTICS_DB)).await?;
        Self::with_storage(data_dir, Arc::new(storage))
    }

    pub fn with_storage<P: AsRef<Path>>(
        data_dir: P,
        storage: Arc<dyn VarianceStorage>,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let headers: Vec<String> = TRACKING_HEADERS.iter().map(|h| h.to_string()).collect();
        let csv = CsvLog::open(data_dir.join(TRACKING_CSV), &headers)?;

        Ok(Self {
            storage,
            csv,
            data_dir,
            last_day: Mutex::new(None),
        })
    }

    pub fn storage(&self) -> &Arc<dyn VarianceStorage> {
        &self.storage
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Persist every window that has at least two samples. Returns the number
    /// of records written.
    ///
    /// The first call on a new UTC day rolls up the previous day. A failed
    /// rollup is logged and retried on the next day change only.
    pub async fn log_miner_variance(
        &self,
        timestamp: u64,
        miner_name: &str,
        results: &[WindowResult],
        expected_hashrate_gh: f64,
        actual_hashrate_gh: f64,
    ) -> Result<usize> {
        let records: Vec<VarianceRecord> = results
            .iter()
            .filter_map(|r| {
                VarianceRecord::from_window(
                    timestamp,
                    miner_name,
                    r,
                    expected_hashrate_gh,
                    actual_hashrate_gh,
                )
            })
            .collect();

        let rows: Vec<Vec<String>> = records.iter().map(tracking_row).collect();
        self.csv.append_rows(&rows)?;
        for record in &records {
            self.storage.store_record(record).await?;
        }

        self.roll_up_if_new_day(timestamp).await;
        Ok(records.len())
    }

    async fn roll_up_if_new_day(&self, timestamp: u64) {
        let today = utc_day_start(timestamp);
        let mut last_day = self.last_day.lock().await;
        if *last_day == Some(today) {
            return;
        }
        *last_day = Some(today);

        let yesterday = today.saturating_sub(SECONDS_PER_DAY);
        match self.storage.generate_daily_summary(yesterday).await {
            Ok(outcome) => info!(
                "Generated daily variance summary for {}: {} summaries, {} miners",
                outcome.date, outcome.summaries_generated, outcome.miners_processed
            ),
            Err(e) => error!("Failed to generate daily variance summary: {}", e),
        }
    }

    pub async fn analytics(&self, miner_name: &str, days: u32, now: u64) -> Result<VarianceAnalytics> {
        let from = now.saturating_sub(u64::from(days) * SECONDS_PER_DAY);
        let mut analytics = self.storage.variance_analytics(miner_name, from).await?;
        analytics.analysis_period_days = Some(days);
        Ok(analytics)
    }

    /// Write a report covering the last `days` days and return the file path.
    pub async fn export_report(&self, miner_name: &str, days: u32, now: u64) -> Result<PathBuf> {
        let analytics = self.analytics(miner_name, days, now).await?;
        let report = VarianceReport {
            analytics: &analytics,
            days,
            generated_at: now,
        };
        let path = report.write_to(&self.data_dir)?;
        info!("Exported variance report for {} to {}", miner_name, path.display());
        Ok(path)
    }

    pub async fn stability_history(
        &self,
        miner_name: &str,
        window_seconds: u64,
        from: u64,
        to: u64,
    ) -> Result<Vec<StabilityPoint>> {
        self.storage
            .stability_history(miner_name, window_seconds, from, to)
            .await
    }
}

fn tracking_row(record: &VarianceRecord) -> Vec<String> {
    let ratio = if record.variance_ratio.is_infinite() {
        "INF".to_string()
    } else {
        format!("{:.2}", record.variance_ratio)
    };

    vec![
        format_utc(record.timestamp, "%Y-%m-%dT%H:%M:%SZ"),
        record.miner_name.clone(),
        record.window_seconds.to_string(),
        format!("{:.2}", record.expected_hashrate_gh),
        format!("{:.2}", record.actual_hashrate_gh),
        format!("{:.2}", record.deviation_gh),
        optional_cell(record.positive_variance, 2),
        optional_cell(record.negative_variance, 2),
        format!("{:.2}", record.avg_deviation),
        record.sample_count.to_string(),
        record.positive_count.to_string(),
        record.negative_count.to_string(),
        ratio,
        format!("{:.1}", record.stability_score),
    ]
}
