use miner_client::{MinerEndpoint, SystemInfo};
use serde::Serialize;
use variance_sv2::{stability_score, StabilityGrade, WindowResult};
use web_assets::format_uptime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MinerStatus {
    Online,
    Offline,
}

impl MinerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinerStatus::Online => "ONLINE",
            MinerStatus::Offline => "OFFLINE",
        }
    }
}

/// One window's statistics with the stability score derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSnapshot {
    #[serde(flatten)]
    pub result: WindowResult,
    pub stability_score: f64,
    pub grade: StabilityGrade,
}

impl WindowSnapshot {
    pub fn new(result: WindowResult, expected_hashrate_gh: f64) -> Self {
        let score = stability_score(&result, expected_hashrate_gh);
        Self {
            result,
            stability_score: score,
            grade: StabilityGrade::from_score(score),
        }
    }
}

/// Everything known about one miner after one poll.
///
/// Offline miners keep their identity and zeroes elsewhere, and carry no
/// window statistics since nothing was recorded for them this tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinerMetrics {
    pub timestamp: u64,
    pub miner_name: String,
    pub miner_ip: String,
    pub status: MinerStatus,

    pub hashrate_gh: f64,
    pub hashrate_th: f64,
    pub expected_hashrate_gh: f64,
    pub expected_hashrate_th: f64,
    pub hashrate_efficiency_pct: f64,
    pub power_w: f64,
    pub efficiency_jth: f64,

    pub temperature_c: f64,
    pub vr_temperature_c: f64,
    pub fan_speed_rpm: f64,

    pub core_voltage_actual_v: f64,
    pub core_voltage_set_v: f64,
    pub input_voltage_v: f64,

    pub frequency_mhz: f64,
    pub best_diff: f64,
    pub session_diff: f64,

    pub accepted_shares: u64,
    pub rejected_shares: u64,
    pub uptime_s: u64,
    pub uptime_formatted: String,

    pub wifi_rssi: i32,
    pub pool_url: String,
    pub worker_name: String,

    pub asic_model: String,
    pub board_version: String,
    pub firmware_version: String,

    /// In configured window order
    pub windows: Vec<WindowSnapshot>,
}

impl MinerMetrics {
    pub fn offline(endpoint: &MinerEndpoint, timestamp: u64) -> Self {
        Self {
            timestamp,
            miner_name: endpoint.name.clone(),
            miner_ip: endpoint.ip.clone(),
            status: MinerStatus::Offline,
            hashrate_gh: 0.0,
            hashrate_th: 0.0,
            expected_hashrate_gh: 0.0,
            expected_hashrate_th: 0.0,
            hashrate_efficiency_pct: 0.0,
            power_w: 0.0,
            efficiency_jth: 0.0,
            temperature_c: 0.0,
            vr_temperature_c: 0.0,
            fan_speed_rpm: 0.0,
            core_voltage_actual_v: 0.0,
            core_voltage_set_v: 0.0,
            input_voltage_v: 0.0,
            frequency_mhz: 0.0,
            best_diff: 0.0,
            session_diff: 0.0,
            accepted_shares: 0,
            rejected_shares: 0,
            uptime_s: 0,
            uptime_formatted: format_uptime(0),
            wifi_rssi: 0,
            pool_url: String::new(),
            worker_name: String::new(),
            asic_model: String::new(),
            board_version: String::new(),
            firmware_version: String::new(),
            windows: Vec::new(),
        }
    }

    /// Derive display metrics from a miner's system info. Voltages arrive in mV.
    pub fn from_system_info(
        endpoint: &MinerEndpoint,
        timestamp: u64,
        info: &SystemInfo,
        expected_hashrate_gh: f64,
    ) -> Self {
        let hashrate_th = info.hash_rate / 1000.0;
        let hashrate_efficiency_pct = if expected_hashrate_gh > 0.0 {
            info.hash_rate / expected_hashrate_gh * 100.0
        } else {
            0.0
        };
        let efficiency_jth = if hashrate_th > 0.0 {
            info.power / hashrate_th
        } else {
            0.0
        };

        Self {
            timestamp,
            miner_name: endpoint.name.clone(),
            miner_ip: endpoint.ip.clone(),
            status: MinerStatus::Online,
            hashrate_gh: info.hash_rate,
            hashrate_th,
            expected_hashrate_gh,
            expected_hashrate_th: expected_hashrate_gh / 1000.0,
            hashrate_efficiency_pct,
            power_w: info.power,
            efficiency_jth,
            temperature_c: info.temp,
            vr_temperature_c: info.vr_temp,
            fan_speed_rpm: info.fan_rpm,
            core_voltage_actual_v: info.core_voltage_actual_mv / 1000.0,
            core_voltage_set_v: info.core_voltage_mv / 1000.0,
            input_voltage_v: info.input_voltage_mv / 1000.0,
            frequency_mhz: info.frequency,
            best_diff: info.best_diff,
            session_diff: info.best_session_diff,
            accepted_shares: info.shares_accepted,
            rejected_shares: info.shares_rejected,
            uptime_s: info.uptime_seconds,
            uptime_formatted: format_uptime(info.uptime_seconds),
            wifi_rssi: info.wifi_rssi,
            pool_url: info.stratum_url.clone(),
            worker_name: info.stratum_user.clone(),
            asic_model: info.asic_model.clone(),
            board_version: info.board_version.clone(),
            firmware_version: info.firmware_version.clone(),
            windows: Vec::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == MinerStatus::Online
    }

    /// Attach window results, scoring each against this miner's baseline.
    pub fn with_windows(mut self, results: Vec<WindowResult>) -> Self {
        let expected = self.expected_hashrate_gh;
        self.windows = results
            .into_iter()
            .map(|r| WindowSnapshot::new(r, expected))
            .collect();
        self
    }

    pub fn window(&self, window_seconds: u64) -> Option<&WindowSnapshot> {
        self.windows
            .iter()
            .find(|w| w.result.window_seconds == window_seconds)
    }

    pub fn window_results(&self) -> Vec<WindowResult> {
        self.windows.iter().map(|w| w.result).collect()
    }
}

/// Fleet-wide totals over the online miners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSummary {
    pub total_hashrate_th: f64,
    pub total_expected_th: f64,
    pub total_power_w: f64,
    /// Total over expected hashrate, percent
    pub fleet_efficiency: f64,
    pub avg_efficiency_jth: f64,
    pub avg_temperature: f64,
    pub online_count: usize,
    pub total_count: usize,
}

impl FleetSummary {
    pub fn from_metrics(metrics: &[MinerMetrics]) -> Self {
        let online: Vec<&MinerMetrics> = metrics.iter().filter(|m| m.is_online()).collect();

        let total_hashrate_th: f64 = online.iter().map(|m| m.hashrate_th).sum();
        let total_expected_th: f64 = online.iter().map(|m| m.expected_hashrate_th).sum();
        let total_power_w: f64 = online.iter().map(|m| m.power_w).sum();

        let fleet_efficiency = if total_expected_th > 0.0 {
            total_hashrate_th / total_expected_th * 100.0
        } else {
            0.0
        };
        let avg_efficiency_jth = if total_hashrate_th > 0.0 {
            total_power_w / total_hashrate_th
        } else {
            0.0
        };
        let avg_temperature = if online.is_empty() {
            0.0
        } else {
            online.iter().map(|m| m.temperature_c).sum::<f64>() / online.len() as f64
        };

        Self {
            total_hashrate_th,
            total_expected_th,
            total_power_w,
            fleet_efficiency,
            avg_efficiency_jth,
            avg_temperature,
            online_count: online.len(),
            total_count: metrics.len(),
        }
    }
}
