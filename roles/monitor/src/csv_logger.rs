use std::path::Path;

use variance_sv2::csv_log::{optional_cell, CsvLog, LoggerError};
use variance_sv2::types::format_utc;
use variance_sv2::WindowResult;

use crate::metrics::MinerMetrics;

const LEADING_COLUMNS: [&str; 9] = [
    "timestamp",
    "miner_name",
    "miner_ip",
    "status",
    "hashrate_gh",
    "hashrate_th",
    "expected_hashrate_gh",
    "expected_hashrate_th",
    "hashrate_efficiency_pct",
];

const TRAILING_COLUMNS: [&str; 20] = [
    "power_w",
    "efficiency_jth",
    "temperature_c",
    "vr_temperature_c",
    "fan_speed_rpm",
    "core_voltage_actual_v",
    "core_voltage_set_v",
    "input_voltage_v",
    "frequency_mhz",
    "best_diff",
    "session_diff",
    "accepted_shares",
    "rejected_shares",
    "uptime_s",
    "wifi_rssi",
    "pool_url",
    "worker_name",
    "asic_model",
    "board_version",
    "firmware_version",
];

type WindowField = fn(&WindowResult) -> Option<f64>;

/// Per-window column groups, each repeated for every configured window.
const WINDOW_COLUMN_GROUPS: [(&str, WindowField); 5] = [
    ("hashrate_variance", |r| r.variance),
    ("hashrate_stddev", |r| r.std_dev),
    ("hashrate_positive_variance", |r| r.positive_deviation_std),
    ("hashrate_negative_variance", |r| r.negative_deviation_std),
    ("hashrate_avg_deviation", |r| r.mean_deviation),
];

/// Appends one row per miner per poll to the metrics CSV.
#[derive(Debug)]
pub struct MetricsCsvLogger {
    log: CsvLog,
    windows: Vec<u64>,
}

impl MetricsCsvLogger {
    pub fn open<P: AsRef<Path>>(path: P, windows: &[u64]) -> Result<Self, LoggerError> {
        let log = CsvLog::open(path, &headers(windows))?;
        Ok(Self {
            log,
            windows: windows.to_vec(),
        })
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    pub fn log_metrics(&self, metrics: &[MinerMetrics]) -> Result<(), LoggerError> {
        let rows: Vec<Vec<String>> = metrics.iter().map(|m| self.row(m)).collect();
        self.log.append_rows(&rows)
    }

    fn row(&self, m: &MinerMetrics) -> Vec<String> {
        let mut row = vec![
            format_utc(m.timestamp, "%Y-%m-%dT%H:%M:%SZ"),
            m.miner_name.clone(),
            m.miner_ip.clone(),
            m.status.as_str().to_string(),
            format!("{:.2}", m.hashrate_gh),
            format!("{:.4}", m.hashrate_th),
            format!("{:.2}", m.expected_hashrate_gh),
            format!("{:.4}", m.expected_hashrate_th),
            format!("{:.1}", m.hashrate_efficiency_pct),
        ];

        for (_, field) in WINDOW_COLUMN_GROUPS {
            for &w in &self.windows {
                let value = m.window(w).and_then(|snapshot| field(&snapshot.result));
                row.push(optional_cell(value, 4));
            }
        }

        row.extend([
            format!("{:.2}", m.power_w),
            format!("{:.2}", m.efficiency_jth),
            format!("{:.1}", m.temperature_c),
            format!("{:.1}", m.vr_temperature_c),
            format!("{:.0}", m.fan_speed_rpm),
            format!("{:.3}", m.core_voltage_actual_v),
            format!("{:.3}", m.core_voltage_set_v),
            format!("{:.2}", m.input_voltage_v),
            format!("{:.0}", m.frequency_mhz),
            format!("{:.0}", m.best_diff),
            format!("{:.0}", m.session_diff),
            m.accepted_shares.to_string(),
            m.rejected_shares.to_string(),
            m.uptime_s.to_string(),
            m.wifi_rssi.to_string(),
            m.pool_url.clone(),
            m.worker_name.clone(),
            m.asic_model.clone(),
            m.board_version.clone(),
            m.firmware_version.clone(),
        ]);
        row
    }
}

pub fn headers(windows: &[u64]) -> Vec<String> {
    let mut headers: Vec<String> = LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
    for (group, _) in WINDOW_COLUMN_GROUPS {
        for w in windows {
            headers.push(format!("{}_{}s", group, w));
        }
    }
    headers.extend(TRAILING_COLUMNS.iter().map(|c| c.to_string()));
    headers
}
