//! SQLite persistence for per-window variance records and daily rollups.

use crate::bucketing::{bucket_size_for_range, TARGET_POINTS};
use crate::stability::{stability_score, variance_ratio};
use crate::types::{format_utc, WindowResult};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const SECONDS_PER_DAY: u64 = 86_400;
const PERIOD_LIMIT: i64 = 10;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV log error: {0}")]
    Log(#[from] crate::csv_log::LoggerError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One persisted row: a window's statistics for one miner at one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceRecord {
    pub timestamp: u64,
    pub miner_name: String,
    pub window_seconds: u64,
    pub expected_hashrate_gh: f64,
    pub actual_hashrate_gh: f64,
    /// Instantaneous deviation of this poll, actual minus expected
    pub deviation_gh: f64,
    pub positive_variance: Option<f64>,
    pub negative_variance: Option<f64>,
    pub avg_deviation: f64,
    pub sample_count: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub variance_ratio: f64,
    pub stability_score: f64,
}

impl VarianceRecord {
    /// Build a record from a window result, or `None` when the window has
    /// fewer than two samples and therefore nothing worth keeping.
    pub fn from_window(
        timestamp: u64,
        miner_name: &str,
        result: &WindowResult,
        expected_hashrate_gh: f64,
        actual_hashrate_gh: f64,
    ) -> Option<Self> {
        if result.sample_count < 2 {
            return None;
        }

        Some(Self {
            timestamp,
            miner_name: miner_name.to_string(),
            window_seconds: result.window_seconds,
            expected_hashrate_gh,
            actual_hashrate_gh,
            deviation_gh: actual_hashrate_gh - expected_hashrate_gh,
            positive_variance: result.positive_deviation_std,
            negative_variance: result.negative_deviation_std,
            avg_deviation: result.mean_deviation.unwrap_or(0.0),
            sample_count: result.sample_count,
            positive_count: result.positive_count,
            negative_count: result.negative_count,
            variance_ratio: variance_ratio(
                result.positive_deviation_std,
                result.negative_deviation_std,
            ),
            stability_score: stability_score(result, expected_hashrate_gh),
        })
    }
}

/// Averages for one window size over the analysis period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTrend {
    pub window_seconds: u64,
    pub avg_positive_variance: Option<f64>,
    pub avg_negative_variance: Option<f64>,
    pub avg_stability: f64,
    pub sample_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityPeriod {
    pub timestamp: u64,
    pub window_seconds: u64,
    pub stability_score: f64,
    pub deviation_gh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceAnalytics {
    pub miner_name: String,
    pub from_timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_period_days: Option<u32>,
    pub variance_trends: Vec<WindowTrend>,
    pub worst_stability_periods: Vec<StabilityPeriod>,
    pub best_stability_periods: Vec<StabilityPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummaryOutcome {
    /// UTC date, `YYYY-MM-DD`
    pub date: String,
    pub summaries_generated: u64,
    pub miners_processed: u64,
}

/// One bucket of the stability chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityPoint {
    pub timestamp: u64,
    pub stability_score: f64,
    pub avg_deviation: f64,
    pub positive_variance: Option<f64>,
    pub negative_variance: Option<f64>,
    pub samples: u64,
}

/// Storage abstraction for persisted variance data.
#[async_trait::async_trait]
pub trait VarianceStorage: Send + Sync {
    async fn store_record(&self, record: &VarianceRecord) -> Result<()>;

    /// Per-window trends plus the ten worst and ten best periods since `from_timestamp`.
    async fn variance_analytics(
        &self,
        miner_name: &str,
        from_timestamp: u64,
    ) -> Result<VarianceAnalytics>;

    /// Roll up the UTC day starting at `day_start` into `variance_summary`.
    async fn generate_daily_summary(&self, day_start: u64) -> Result<DailySummaryOutcome>;

    async fn stability_history(
        &self,
        miner_name: &str,
        window_seconds: u64,
        from_timestamp: u64,
        to_timestamp: u64,
    ) -> Result<Vec<StabilityPoint>>;
}

/// SQLite-backed storage implementation.
pub struct SqliteVarianceStorage {
    pool: Pool<Sqlite>,
}

impl SqliteVarianceStorage {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connection_options)
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variance_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                miner_name TEXT NOT NULL,
                window_seconds INTEGER NOT NULL,
                expected_hashrate_gh REAL NOT NULL,
                actual_hashrate_gh REAL NOT NULL,
                deviation_gh REAL NOT NULL,
                positive_variance REAL,
                negative_variance REAL,
                avg_deviation REAL NOT NULL,
                sample_count INTEGER NOT NULL,
                positive_count INTEGER NOT NULL,
                negative_count INTEGER NOT NULL,
                variance_ratio REAL,
                stability_score REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_variance_timestamp ON variance_metrics(timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_variance_miner ON variance_metrics(miner_name, timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_variance_window ON variance_metrics(window_seconds)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variance_summary (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                miner_name TEXT NOT NULL,
                window_seconds INTEGER NOT NULL,
                avg_positive_variance REAL,
                avg_negative_variance REAL,
                max_positive_deviation REAL,
                max_negative_deviation REAL,
                stability_score REAL NOT NULL,
                measurement_count INTEGER NOT NULL,
                UNIQUE(date, miner_name, window_seconds)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_period(row: &SqliteRow) -> StabilityPeriod {
        StabilityPeriod {
            timestamp: row.get::<i64, _>("timestamp") as u64,
            window_seconds: row.get::<i64, _>("window_seconds") as u64,
            stability_score: row.get::<f64, _>("stability_score"),
            deviation_gh: row.get::<f64, _>("deviation_gh"),
        }
    }

    async fn stability_periods(
        &self,
        miner_name: &str,
        from_timestamp: u64,
        worst_first: bool,
    ) -> Result<Vec<StabilityPeriod>> {
        let order = if worst_first { "ASC" } else { "DESC" };
        let sql = format!(
            r#"
            SELECT timestamp, window_seconds, stability_score, deviation_gh
            FROM variance_metrics
            WHERE miner_name = ? AND timestamp >= ?
            ORDER BY stability_score {}, timestamp DESC
            LIMIT ?
            "#,
            order
        );

        let rows = sqlx::query(&sql)
            .bind(miner_name)
            .bind(from_timestamp as i64)
            .bind(PERIOD_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(Self::row_to_period).collect())
    }
}

#[async_trait::async_trait]
impl VarianceStorage for SqliteVarianceStorage {
    async fn store_record(&self, record: &VarianceRecord) -> Result<()> {
        if record.miner_name.is_empty() {
            return Err(StorageError::InvalidArgument(
                "miner name must not be empty".to_string(),
            ));
        }

        tracing::debug!(
            "Storing variance record: miner={}, window={}s, samples={}, score={:.1}",
            record.miner_name,
            record.window_seconds,
            record.sample_count,
            record.stability_score
        );

        // An infinite ratio (upward spread only) is stored as NULL
        let ratio = record
            .variance_ratio
            .is_finite()
            .then_some(record.variance_ratio);

        sqlx::query(
            r#"
            INSERT INTO variance_metrics (
                timestamp, miner_name, window_seconds, expected_hashrate_gh,
                actual_hashrate_gh, deviation_gh, positive_variance, negative_variance,
                avg_deviation, sample_count, positive_count, negative_count,
                variance_ratio, stability_score
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp as i64)
        .bind(&record.miner_name)
        .bind(record.window_seconds as i64)
        .bind(record.expected_hashrate_gh)
        .bind(record.actual_hashrate_gh)
        .bind(record.deviation_gh)
        .bind(record.positive_variance)
        .bind(record.negative_variance)
        .bind(record.avg_deviation)
        .bind(record.sample_count as i64)
        .bind(record.positive_count as i64)
        .bind(record.negative_count as i64)
        .bind(ratio)
        .bind(record.stability_score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn variance_analytics(
        &self,
        miner_name: &str,
        from_timestamp: u64,
    ) -> Result<VarianceAnalytics> {
        let rows = sqlx::query(
            r#"
            SELECT window_seconds,
                   AVG(positive_variance) AS avg_pos_var,
                   AVG(negative_variance) AS avg_neg_var,
                   AVG(stability_score) AS avg_stability,
                   COUNT(*) AS sample_count
            FROM variance_metrics
            WHERE miner_name = ? AND timestamp >= ?
            GROUP BY window_seconds
            ORDER BY window_seconds
            "#,
        )
        .bind(miner_name)
        .bind(from_timestamp as i64)
        .fetch_all(&self.pool)
        .await?;

        let variance_trends = rows
            .iter()
            .map(|row| WindowTrend {
                window_seconds: row.get::<i64, _>("window_seconds") as u64,
                avg_positive_variance: row.get::<Option<f64>, _>("avg_pos_var"),
                avg_negative_variance: row.get::<Option<f64>, _>("avg_neg_var"),
                avg_stability: row.get::<f64, _>("avg_stability"),
                sample_count: row.get::<i64, _>("sample_count") as u64,
            })
            .collect();

        Ok(VarianceAnalytics {
            miner_name: miner_name.to_string(),
            from_timestamp,
            analysis_period_days: None,
            variance_trends,
            worst_stability_periods: self
                .stability_periods(miner_name, from_timestamp, true)
                .await?,
            best_stability_periods: self
                .stability_periods(miner_name, from_timestamp, false)
                .await?,
        })
    }

    async fn generate_daily_summary(&self, day_start: u64) -> Result<DailySummaryOutcome> {
        if day_start % SECONDS_PER_DAY != 0 {
            return Err(StorageError::InvalidArgument(format!(
                "{} is not the start of a UTC day",
                day_start
            )));
        }
        let date = format_utc(day_start, "%Y-%m-%d");

        let rows = sqlx::query(
            r#"
            SELECT miner_name, window_seconds,
                   AVG(positive_variance) AS avg_positive_variance,
                   AVG(negative_variance) AS avg_negative_variance,
                   MAX(CASE WHEN deviation_gh > 0 THEN deviation_gh END) AS max_positive_deviation,
                   MAX(CASE WHEN deviation_gh < 0 THEN -deviation_gh END) AS max_negative_deviation,
                   AVG(stability_score) AS avg_stability_score,
                   COUNT(*) AS measurement_count
            FROM variance_metrics
            WHERE timestamp >= ? AND timestamp < ?
            GROUP BY miner_name, window_seconds
            "#,
        )
        .bind(day_start as i64)
        .bind((day_start + SECONDS_PER_DAY) as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut miners = std::collections::HashSet::new();
        for row in &rows {
            let miner_name = row.get::<String, _>("miner_name");

            sqlx::query(
                r#"
                INSERT INTO variance_summary (
                    date, miner_name, window_seconds, avg_positive_variance,
                    avg_negative_variance, max_positive_deviation, max_negative_deviation,
                    stability_score, measurement_count
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, miner_name, window_seconds) DO UPDATE SET
                    avg_positive_variance = excluded.avg_positive_variance,
                    avg_negative_variance = excluded.avg_negative_variance,
                    max_positive_deviation = excluded.max_positive_deviation,
                    max_negative_deviation = excluded.max_negative_deviation,
                    stability_score = excluded.stability_score,
                    measurement_count = excluded.measurement_count
                "#,
            )
            .bind(&date)
            .bind(&miner_name)
            .bind(row.get::<i64, _>("window_seconds"))
            .bind(row.get::<Option<f64>, _>("avg_positive_variance"))
            .bind(row.get::<Option<f64>, _>("avg_negative_variance"))
            .bind(row.get::<Option<f64>, _>("max_positive_deviation"))
            .bind(row.get::<Option<f64>, _>("max_negative_deviation"))
            .bind(row.get::<f64, _>("avg_stability_score"))
            .bind(row.get::<i64, _>("measurement_count"))
            .execute(&self.pool)
            .await?;

            miners.insert(miner_name);
        }

        Ok(DailySummaryOutcome {
            date,
            summaries_generated: rows.len() as u64,
            miners_processed: miners.len() as u64,
        })
    }

    async fn stability_history(
        &self,
        miner_name: &str,
        window_seconds: u64,
        from_timestamp: u64,
        to_timestamp: u64,
    ) -> Result<Vec<StabilityPoint>> {
        if from_timestamp > to_timestamp {
            return Err(StorageError::InvalidArgument(format!(
                "from ({}) is after to ({})",
                from_timestamp, to_timestamp
            )));
        }

        let bucket_seconds = bucket_size_for_range(from_timestamp, to_timestamp, TARGET_POINTS);

        let rows = sqlx::query(
            r#"
            SELECT (timestamp / ?) * ? AS bucket_timestamp,
                   AVG(stability_score) AS stability_score,
                   AVG(avg_deviation) AS avg_deviation,
                   AVG(positive_variance) AS positive_variance,
                   AVG(negative_variance) AS negative_variance,
                   COUNT(*) AS samples
            FROM variance_metrics
            WHERE miner_name = ? AND window_seconds = ?
              AND timestamp >= ? AND timestamp <= ?
            GROUP BY bucket_timestamp
            ORDER BY bucket_timestamp ASC
            "#,
        )
        .bind(bucket_seconds as i64)
        .bind(bucket_seconds as i64)
        .bind(miner_name)
        .bind(window_seconds as i64)
        .bind(from_timestamp as i64)
        .bind(to_timestamp as i64)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            "Stability history for {} ({}s window): {} buckets of {}s",
            miner_name,
            window_seconds,
            rows.len(),
            bucket_seconds
        );

        Ok(rows
            .iter()
            .map(|row| StabilityPoint {
                timestamp: row.get::<i64, _>("bucket_timestamp") as u64,
                stability_score: row.get::<f64, _>("stability_score"),
                avg_deviation: row.get::<f64, _>("avg_deviation"),
                positive_variance: row.get::<Option<f64>, _>("positive_variance"),
                negative_variance: row.get::<Option<f64>, _>("negative_variance"),
                samples: row.get::<i64, _>("samples") as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // 2024-03-01T00:00:00Z
    const DAY_START: u64 = 1_709_251_200;

    fn record(miner: &str, timestamp: u64, window: u64, score: f64, deviation: f64) -> VarianceRecord {
        VarianceRecord {
            timestamp,
            miner_name: miner.to_string(),
            window_seconds: window,
            expected_hashrate_gh: 1200.0,
            actual_hashrate_gh: 1200.0 + deviation,
            deviation_gh: deviation,
            positive_variance: Some(10.0),
            negative_variance: Some(20.0),
            avg_deviation: deviation,
            sample_count: 5,
            positive_count: 2,
            negative_count: 3,
            variance_ratio: 0.5,
            stability_score: score,
        }
    }

    async fn open(temp_dir: &TempDir) -> SqliteVarianceStorage {
        SqliteVarianceStorage::new(temp_dir.path().join("variance_analytics.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_storage_creation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('variance_metrics', 'variance_summary')",
        )
        .fetch_one(&storage.pool)
        .await
        .unwrap();

        assert_eq!(result.0, 2);
    }

    #[tokio::test]
    async fn test_storage_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("data").join("v.db");
        SqliteVarianceStorage::new(&db_path).await.unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_record_from_window() {
        let result = WindowResult {
            window_seconds: 60,
            sample_count: 4,
            variance: Some(100.0),
            std_dev: Some(10.0),
            positive_deviation_std: Some(12.0),
            negative_deviation_std: None,
            mean_deviation: Some(-60.0),
            positive_count: 4,
            negative_count: 0,
        };

        let record = VarianceRecord::from_window(100, "M1", &result, 1200.0, 1150.0).unwrap();
        assert_eq!(record.deviation_gh, -50.0);
        assert_eq!(record.avg_deviation, -60.0);
        assert_eq!(record.variance_ratio, f64::INFINITY);
        assert_eq!(record.stability_score, 90.0);

        let thin = WindowResult {
            sample_count: 1,
            ..WindowResult::empty(60)
        };
        assert!(VarianceRecord::from_window(100, "M1", &thin, 1200.0, 1150.0).is_none());
    }

    #[tokio::test]
    async fn test_store_rejects_empty_miner_name() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        let err = storage
            .store_record(&record("", DAY_START, 60, 90.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_infinite_ratio_is_stored_as_null() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        let mut rec = record("M1", DAY_START, 60, 90.0, 0.0);
        rec.variance_ratio = f64::INFINITY;
        storage.store_record(&rec).await.unwrap();

        let ratio: (Option<f64>,) = sqlx::query_as("SELECT variance_ratio FROM variance_metrics")
            .fetch_one(&storage.pool)
            .await
            .unwrap();
        assert_eq!(ratio.0, None);
    }

    #[tokio::test]
    async fn test_variance_analytics() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        for i in 0..12u64 {
            let ts = DAY_START + i * 60;
            storage
                .store_record(&record("M1", ts, 60, 50.0 + i as f64, -(i as f64)))
                .await
                .unwrap();
            storage
                .store_record(&record("M1", ts, 300, 90.0, 1.0))
                .await
                .unwrap();
        }
        // Other miners and older rows are excluded
        storage
            .store_record(&record("M2", DAY_START, 60, 1.0, 0.0))
            .await
            .unwrap();
        storage
            .store_record(&record("M1", DAY_START - 10, 60, 0.0, 0.0))
            .await
            .unwrap();

        let analytics = storage.variance_analytics("M1", DAY_START).await.unwrap();

        assert_eq!(analytics.miner_name, "M1");
        assert_eq!(analytics.variance_trends.len(), 2);
        assert_eq!(analytics.variance_trends[0].window_seconds, 60);
        assert_eq!(analytics.variance_trends[0].sample_count, 12);
        assert_eq!(analytics.variance_trends[0].avg_stability, 55.5);
        assert_eq!(analytics.variance_trends[0].avg_positive_variance, Some(10.0));
        assert_eq!(analytics.variance_trends[1].window_seconds, 300);

        assert_eq!(analytics.worst_stability_periods.len(), 10);
        assert_eq!(analytics.worst_stability_periods[0].stability_score, 50.0);
        assert_eq!(analytics.worst_stability_periods[0].window_seconds, 60);
        assert_eq!(analytics.best_stability_periods.len(), 10);
        assert_eq!(analytics.best_stability_periods[0].stability_score, 90.0);
    }

    #[tokio::test]
    async fn test_analytics_for_unknown_miner_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        let analytics = storage.variance_analytics("nobody", 0).await.unwrap();
        assert!(analytics.variance_trends.is_empty());
        assert!(analytics.worst_stability_periods.is_empty());
        assert!(analytics.best_stability_periods.is_empty());
    }

    #[tokio::test]
    async fn test_daily_summary() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        storage
            .store_record(&record("M1", DAY_START + 10, 60, 80.0, 25.0))
            .await
            .unwrap();
        storage
            .store_record(&record("M1", DAY_START + 70, 60, 90.0, -40.0))
            .await
            .unwrap();
        storage
            .store_record(&record("M2", DAY_START + 70, 300, 70.0, 5.0))
            .await
            .unwrap();
        // Next day, not part of the summary
        storage
            .store_record(&record("M1", DAY_START + SECONDS_PER_DAY, 60, 10.0, 0.0))
            .await
            .unwrap();

        let outcome = storage.generate_daily_summary(DAY_START).await.unwrap();
        assert_eq!(outcome.date, "2024-03-01");
        assert_eq!(outcome.summaries_generated, 2);
        assert_eq!(outcome.miners_processed, 2);

        let row: (f64, f64, f64, i64) = sqlx::query_as(
            "SELECT stability_score, max_positive_deviation, max_negative_deviation, measurement_count
             FROM variance_summary WHERE miner_name = 'M1' AND window_seconds = 60",
        )
        .fetch_one(&storage.pool)
        .await
        .unwrap();
        assert_eq!(row, (85.0, 25.0, 40.0, 2));

        // Regenerating replaces rather than duplicates
        storage.generate_daily_summary(DAY_START).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM variance_summary")
            .fetch_one(&storage.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 2);
    }

    #[tokio::test]
    async fn test_daily_summary_requires_day_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        assert!(storage.generate_daily_summary(DAY_START + 1).await.is_err());
    }

    #[tokio::test]
    async fn test_stability_history_buckets() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        // One-hour range => 60 second buckets
        for (offset, score) in [(0u64, 80.0), (30, 90.0), (120, 70.0)] {
            storage
                .store_record(&record("M1", DAY_START + offset, 300, score, 0.0))
                .await
                .unwrap();
        }
        storage
            .store_record(&record("M1", DAY_START + 30, 60, 0.0, 0.0))
            .await
            .unwrap();

        let points = storage
            .stability_history("M1", 300, DAY_START, DAY_START + 3_600)
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, DAY_START);
        assert_eq!(points[0].stability_score, 85.0);
        assert_eq!(points[0].samples, 2);
        assert_eq!(points[1].timestamp, DAY_START + 120);
        assert_eq!(points[1].stability_score, 70.0);
    }

    #[tokio::test]
    async fn test_stability_history_rejects_inverted_range() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir).await;

        let err = storage.stability_history("M1", 60, 100, 50).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }
}
