use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use miner_client::{expected_hashrate_gh, BitaxeClient, MinerEndpoint, ReachabilityLog, SystemInfo};
use shared_config::MonitorGlobalConfig;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::error;
use variance_sv2::{unix_timestamp, VarianceEngine, VarianceTracker};

use crate::csv_logger::MetricsCsvLogger;
use crate::display::log_collection;
use crate::history::{ChartPoint, DebugReport, OperatingHistory, OperatingPoint};
use crate::metrics::{MinerMetrics, WindowSnapshot};

/// Window served by the history endpoint.
pub const HISTORY_WINDOW_SECONDS: u64 = 600;

/// Unix seconds that never move backwards.
///
/// Anchored to the wall clock once, then advanced by a monotonic instant, so
/// an NTP step during a run cannot hand the sample buffers an older timestamp.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_unix: u64,
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(unix_timestamp())
    }

    pub fn starting_at(anchor_unix: u64) -> Self {
        Self {
            anchor_unix,
            anchor: Instant::now(),
        }
    }

    pub fn now(&self) -> u64 {
        self.anchor_unix + self.anchor.elapsed().as_secs()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    metrics: Vec<MinerMetrics>,
    collected_at: Option<Instant>,
}

/// Polls every miner once per tick, feeds the variance engine and keeps the
/// latest results for the web server.
pub struct MetricsCollector {
    client: BitaxeClient,
    miners: Vec<MinerEndpoint>,
    expected_overrides: HashMap<String, f64>,
    engine: Arc<VarianceEngine>,
    tracker: Arc<VarianceTracker>,
    csv: MetricsCsvLogger,
    clock: MonotonicClock,
    show_detailed: bool,
    reachability: Mutex<ReachabilityLog>,
    operating: Mutex<OperatingHistory>,
    latest: RwLock<Snapshot>,
}

impl MetricsCollector {
    pub fn new(
        client: BitaxeClient,
        config: &MonitorGlobalConfig,
        engine: Arc<VarianceEngine>,
        tracker: Arc<VarianceTracker>,
        csv: MetricsCsvLogger,
    ) -> Self {
        let miners = config
            .miners
            .iter()
            .map(|m| MinerEndpoint::new(m.name.clone(), m.ip.clone(), m.port))
            .collect();

        Self {
            client,
            miners,
            expected_overrides: config.expected_hashrates(),
            engine,
            tracker,
            csv,
            clock: MonotonicClock::new(),
            show_detailed: config.display.show_detailed,
            reachability: Mutex::new(ReachabilityLog::new()),
            operating: Mutex::new(OperatingHistory::new(config.variance.retention_secs)),
            latest: RwLock::new(Snapshot::default()),
        }
    }

    /// Build the HTTP client, sample engine, tracker and CSV log described by `config`.
    pub async fn open(config: &MonitorGlobalConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = BitaxeClient::new(Duration::from_secs(config.polling.request_timeout_secs))?;
        let engine = Arc::new(VarianceEngine::new(
            config.variance.windows.clone(),
            config.variance.retention_secs,
        ));
        let tracker = Arc::new(VarianceTracker::open(&config.storage.data_dir).await?);
        let csv = MetricsCsvLogger::open(config.metrics_csv_path(), &config.variance.windows)?;

        Ok(Self::new(client, config, engine, tracker, csv))
    }

    pub fn engine(&self) -> &Arc<VarianceEngine> {
        &self.engine
    }

    pub fn tracker(&self) -> &Arc<VarianceTracker> {
        &self.tracker
    }

    pub fn csv_path(&self) -> &std::path::Path {
        self.csv.path()
    }

    /// Poll all miners concurrently and publish the results, sorted by name.
    ///
    /// Only miners that answered are recorded; an outage leaves a gap in the
    /// sample buffer rather than a zero.
    pub async fn collect_all(&self) -> Vec<MinerMetrics> {
        let timestamp = self.clock.now();

        let mut tasks = JoinSet::new();
        for (index, endpoint) in self.miners.iter().enumerate() {
            let client = self.client.clone();
            let endpoint = endpoint.clone();
            tasks.spawn(async move { (index, client.fetch_system_info(&endpoint).await) });
        }

        let mut fetched: Vec<Option<Result<SystemInfo, miner_client::ClientError>>> =
            self.miners.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => fetched[index] = Some(result),
                Err(e) => error!("Miner poll task failed: {}", e),
            }
        }

        let mut metrics = Vec::with_capacity(self.miners.len());
        {
            let mut reachability = self
                .reachability
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut operating = self.operating.lock().unwrap_or_else(PoisonError::into_inner);

            for (endpoint, result) in self.miners.iter().zip(fetched) {
                let miner = match result {
                    Some(Ok(info)) => {
                        reachability.mark_online(&endpoint.name);
                        let expected = self.expected_hashrate(&endpoint.name, &info);
                        self.engine
                            .record(&endpoint.name, timestamp, info.hash_rate, expected);
                        let miner = MinerMetrics::from_system_info(endpoint, timestamp, &info, expected)
                            .with_windows(self.engine.query_all(&endpoint.name));
                        operating.record(
                            &endpoint.name,
                            OperatingPoint {
                                timestamp,
                                efficiency_pct: miner.hashrate_efficiency_pct,
                                voltage_v: miner.core_voltage_actual_v,
                            },
                        );
                        miner
                    }
                    Some(Err(e)) => {
                        reachability.mark_offline(&endpoint.name, &e);
                        MinerMetrics::offline(endpoint, timestamp)
                    }
                    None => {
                        reachability.mark_offline(&endpoint.name, &"poll task aborted");
                        MinerMetrics::offline(endpoint, timestamp)
                    }
                };
                metrics.push(miner);
            }
        }
        metrics.sort_by(|a, b| a.miner_name.cmp(&b.miner_name));

        self.persist(&metrics).await;

        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        latest.metrics = metrics.clone();
        latest.collected_at = Some(Instant::now());
        drop(latest);

        log_collection(&metrics, self.show_detailed);
        metrics
    }

    async fn persist(&self, metrics: &[MinerMetrics]) {
        if let Err(e) = self.csv.log_metrics(metrics) {
            error!("Failed to write metrics CSV: {}", e);
        }

        for miner in metrics.iter().filter(|m| m.is_online()) {
            if let Err(e) = self
                .tracker
                .log_miner_variance(
                    miner.timestamp,
                    &miner.miner_name,
                    &miner.window_results(),
                    miner.expected_hashrate_gh,
                    miner.hashrate_gh,
                )
                .await
            {
                error!("Failed to log variance for {}: {}", miner.miner_name, e);
            }
        }
    }

    /// Configured override, else the ASIC lookup for the reported model and clock.
    fn expected_hashrate(&self, miner: &str, info: &SystemInfo) -> f64 {
        self.expected_overrides
            .get(miner)
            .copied()
            .unwrap_or_else(|| expected_hashrate_gh(&info.asic_model, info.frequency))
    }

    /// Results of the last completed collection.
    pub fn latest(&self) -> Vec<MinerMetrics> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .metrics
            .clone()
    }

    /// True when a collection finished within `max_age`.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        match latest.collected_at {
            Some(at) => at.elapsed() <= max_age,
            None => false,
        }
    }

    /// Current window statistics for `miner`, scored against its latest baseline.
    ///
    /// Unknown miners get empty results.
    pub fn window_snapshots(&self, miner: &str) -> Vec<WindowSnapshot> {
        let expected = self
            .latest()
            .iter()
            .find(|m| m.miner_name == miner && m.is_online())
            .map(|m| m.expected_hashrate_gh)
            .or_else(|| self.expected_overrides.get(miner).copied())
            .unwrap_or(0.0);

        self.engine
            .query_all(miner)
            .into_iter()
            .map(|r| WindowSnapshot::new(r, expected))
            .collect()
    }

    /// Hashrate samples of the last [`HISTORY_WINDOW_SECONDS`] with the
    /// efficiency and voltage recorded on the same tick.
    pub fn history(&self, miner: &str) -> Vec<ChartPoint> {
        let samples = self.engine.history(miner, HISTORY_WINDOW_SECONDS);
        let operating = self.operating.lock().unwrap_or_else(PoisonError::into_inner);
        samples
            .into_iter()
            .map(|sample| {
                let point = operating.at(miner, sample.time);
                ChartPoint::merge(sample, point)
            })
            .collect()
    }

    pub fn debug_report(&self, miner: &str) -> Option<DebugReport> {
        DebugReport::from_points(miner, &self.history(miner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_config::MinerConfig;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer every connection with the same system info body.
    async fn mock_miner(body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        port
    }

    fn config(dir: &TempDir, miners: Vec<MinerConfig>) -> MonitorGlobalConfig {
        let mut config = MonitorGlobalConfig {
            miners,
            ..MonitorGlobalConfig::default()
        };
        config.storage.data_dir = dir.path().to_string_lossy().into_owned();
        config.polling.request_timeout_secs = 2;
        config
    }

    fn miner(name: &str, port: u16, expected: Option<f64>) -> MinerConfig {
        MinerConfig {
            name: name.to_string(),
            ip: "127.0.0.1".to_string(),
            port,
            expected_hashrate_gh: expected,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_advances_with_elapsed_time() {
        let clock = MonotonicClock::starting_at(1_000);
        assert_eq!(clock.now(), 1_000);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(clock.now(), 1_061);
    }

    #[tokio::test]
    async fn test_collect_records_online_miners_only() {
        let dir = TempDir::new().unwrap();
        let gamma = mock_miner(r#"{"hashRate": 1150.0, "power": 19.5, "temp": 60, "frequency": 600, "coreVoltageActual": 1150, "ASICModel": "BM1370"}"#).await;
        // Nothing listens on port 1
        let config = config(&dir, vec![miner("Zeta", 1, None), miner("Gamma", gamma, None)]);
        let collector = MetricsCollector::open(&config).await.unwrap();

        assert!(!collector.is_fresh(Duration::from_secs(180)));

        collector.collect_all().await;
        let metrics = collector.collect_all().await;

        // Sorted by name
        assert_eq!(metrics[0].miner_name, "Gamma");
        assert_eq!(metrics[1].miner_name, "Zeta");

        let gamma = &metrics[0];
        assert!(gamma.is_online());
        assert_eq!(gamma.expected_hashrate_gh, 1200.0);
        assert_eq!(gamma.windows.len(), 3);
        let w60 = gamma.window(60).unwrap();
        assert_eq!(w60.result.sample_count, 2);
        assert_eq!(w60.result.variance, Some(0.0));

        assert!(!metrics[1].is_online());
        assert!(metrics[1].windows.is_empty());
        assert_eq!(collector.engine().retained_samples("Zeta"), 0);
        assert_eq!(collector.engine().retained_samples("Gamma"), 2);

        assert!(collector.is_fresh(Duration::from_secs(180)));
        assert_eq!(collector.latest(), metrics);

        let history = collector.history("Gamma");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sample.hashrate, 1150.0);
        assert!((history[0].efficiency - 95.833).abs() < 1e-3);
        assert_eq!(history[1].voltage, 1.15);
        assert!(collector.history("Zeta").is_empty());
        assert!(collector.debug_report("Zeta").is_none());

        let csv = fs::read_to_string(collector.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 1 + 2 * 2);

        // Second tick had two samples per window, so the tracker persisted each window
        let tracking = fs::read_to_string(dir.path().join("variance_tracking.csv")).unwrap();
        assert_eq!(tracking.lines().count(), 1 + 3);
    }

    #[tokio::test]
    async fn test_expected_override_beats_asic_lookup() {
        let dir = TempDir::new().unwrap();
        let port = mock_miner(r#"{"hashRate": 500.0, "frequency": 600, "ASICModel": "BM1370"}"#).await;
        let config = config(&dir, vec![miner("Tuned", port, Some(1000.0))]);
        let collector = MetricsCollector::open(&config).await.unwrap();

        let metrics = collector.collect_all().await;
        assert_eq!(metrics[0].expected_hashrate_gh, 1000.0);
        assert_eq!(metrics[0].hashrate_efficiency_pct, 50.0);

        // A single sample has no directional data yet
        let windows = collector.window_snapshots("Tuned");
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].result.sample_count, 1);
        assert_eq!(windows[0].result.mean_deviation, None);
        assert_eq!(windows[0].stability_score, 100.0);

        // Two samples 50% low score zero
        collector.collect_all().await;
        let windows = collector.window_snapshots("Tuned");
        assert_eq!(windows[0].result.sample_count, 2);
        assert_eq!(windows[0].result.mean_deviation, Some(-500.0));
        assert_eq!(windows[0].stability_score, 0.0);

        let report = collector.debug_report("Tuned").unwrap();
        assert_eq!(report.data_points, 2);
        assert_eq!(report.efficiency_range.min, 50.0);
        assert_eq!(report.efficiency_range.max, 50.0);
    }

    #[tokio::test]
    async fn test_unknown_miner_has_empty_windows() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, vec![miner("Solo", 1, None)]);
        let collector = MetricsCollector::open(&config).await.unwrap();

        let windows = collector.window_snapshots("nobody");
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.result.sample_count == 0 && w.result.variance.is_none()));
        assert!(collector.history("nobody").is_empty());
    }
}
