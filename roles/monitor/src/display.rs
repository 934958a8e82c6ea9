//! Per-tick fleet summary written to the log.
//!
//! One line per miner with the headline numbers and the window σ values,
//! followed by fleet totals. The detailed view adds a block per online miner.

use tracing::info;
use variance_sv2::types::format_utc;

use crate::metrics::{FleetSummary, MinerMetrics};

/// σ above this (GH/s) is flagged with `!`.
pub const HIGH_STDDEV_GH: f64 = 50.0;

const STABLE_STDDEV_GH: f64 = 20.0;
const MEDIUM_STDDEV_GH: f64 = 40.0;

/// Log the summary table and, when `detailed`, a block per online miner.
pub fn log_collection(metrics: &[MinerMetrics], detailed: bool) {
    for line in summary_lines(metrics) {
        info!("{}", line);
    }
    if detailed {
        for miner in metrics.iter().filter(|m| m.is_online()) {
            for line in detailed_lines(miner) {
                info!("{}", line);
            }
        }
    }
}

/// `σ` for one window, `-` while it is still filling, `!` when above [`HIGH_STDDEV_GH`].
pub fn format_stddev(std_dev: Option<f64>) -> String {
    match std_dev {
        None => "-".to_string(),
        Some(s) if s > HIGH_STDDEV_GH => format!("{:.1}!", s),
        Some(s) => format!("{:.1}", s),
    }
}

/// Rating from the shortest window's σ.
pub fn variance_rating(std_dev: Option<f64>) -> &'static str {
    match std_dev {
        None => "-",
        Some(s) if s < STABLE_STDDEV_GH => "STABLE",
        Some(s) if s < MEDIUM_STDDEV_GH => "MEDIUM",
        Some(_) => "HIGH!",
    }
}

fn format_efficiency(miner: &MinerMetrics) -> String {
    if !(miner.expected_hashrate_gh > 0.0) {
        return "N/A".to_string();
    }
    let pct = miner.hashrate_efficiency_pct;
    if pct >= 85.0 {
        format!("{:.0}*", pct)
    } else if pct < 70.0 {
        format!("{:.0}!", pct)
    } else {
        format!("{:.0}%", pct)
    }
}

fn summary_row(miner: &MinerMetrics) -> String {
    if !miner.is_online() {
        return format!("OFF {} OFFLINE", miner.miner_name);
    }

    let sigmas: Vec<String> = miner
        .windows
        .iter()
        .map(|w| format!("σ{}={}", w.result.window_seconds, format_stddev(w.result.std_dev)))
        .collect();
    let shortest = miner.windows.first().and_then(|w| w.result.std_dev);

    format!(
        "ON  {} {:.3} TH/s {:.0}W {:.0}MHz {:.3}V/{:.3}V {:.1} J/TH eff {} {:.1}°C {} {} up {}",
        miner.miner_name,
        miner.hashrate_th,
        miner.power_w,
        miner.frequency_mhz,
        miner.core_voltage_set_v,
        miner.core_voltage_actual_v,
        miner.efficiency_jth,
        format_efficiency(miner),
        miner.temperature_c,
        sigmas.join(" "),
        variance_rating(shortest),
        miner.uptime_formatted,
    )
}

/// Summary table: one row per miner, then fleet totals.
pub fn summary_lines(metrics: &[MinerMetrics]) -> Vec<String> {
    let fleet = FleetSummary::from_metrics(metrics);

    let mut lines = Vec::with_capacity(metrics.len() + 2);
    lines.push(format!(
        "📊 Fleet summary: {}/{} miners online",
        fleet.online_count, fleet.total_count
    ));
    lines.extend(metrics.iter().map(summary_row));

    if fleet.online_count == 0 {
        lines.push("ALL MINERS OFFLINE".to_string());
    } else {
        let efficiency = if fleet.total_expected_th > 0.0 {
            format!("{:.0}%", fleet.fleet_efficiency)
        } else {
            "N/A".to_string()
        };
        lines.push(format!(
            "SUM {:.3} TH/s of {:.3} TH/s expected, {:.0}W, {:.1} J/TH, eff {}, avg {:.1}°C",
            fleet.total_hashrate_th,
            fleet.total_expected_th,
            fleet.total_power_w,
            fleet.avg_efficiency_jth,
            efficiency,
            fleet.avg_temperature,
        ));
    }
    lines
}

/// Everything reported for one miner, one field per line.
pub fn detailed_lines(miner: &MinerMetrics) -> Vec<String> {
    let mut lines = vec![format!(
        ">> {} ({}) at {}",
        miner.miner_name,
        miner.miner_ip,
        format_utc(miner.timestamp, "%Y-%m-%d %H:%M:%S")
    )];

    lines.push(format!(
        "   Hashrate:      {:.2} GH/s ({:.3} TH/s)",
        miner.hashrate_gh, miner.hashrate_th
    ));
    if miner.expected_hashrate_gh > 0.0 {
        lines.push(format!(
            "   Expected:      {:.2} GH/s ({:.3} TH/s), {:.1}% efficiency",
            miner.expected_hashrate_gh, miner.expected_hashrate_th, miner.hashrate_efficiency_pct
        ));
    }
    for window in &miner.windows {
        if let (Some(variance), Some(std_dev)) = (window.result.variance, window.result.std_dev) {
            lines.push(format!(
                "   Variance {}s:  σ²={:.2}, σ={:.2} GH/s, score {:.1}",
                window.result.window_seconds, variance, std_dev, window.stability_score
            ));
        }
    }

    lines.push(format!("   Power:         {:.1} W", miner.power_w));
    lines.push(format!("   Efficiency:    {:.1} J/TH", miner.efficiency_jth));
    lines.push(format!(
        "   Temperature:   {:.1}°C (ASIC) / {:.1}°C (VR)",
        miner.temperature_c, miner.vr_temperature_c
    ));
    lines.push(format!("   Fan:           {:.0} RPM", miner.fan_speed_rpm));
    lines.push(format!(
        "   Core voltage:  {:.3}V (set) / {:.3}V (actual)",
        miner.core_voltage_set_v, miner.core_voltage_actual_v
    ));
    lines.push(format!("   Input voltage: {:.2}V", miner.input_voltage_v));
    lines.push(format!("   Frequency:     {:.0} MHz", miner.frequency_mhz));
    lines.push(format!(
        "   Difficulty:    best {:.0}, session {:.0}",
        miner.best_diff, miner.session_diff
    ));
    lines.push(format!(
        "   Shares:        {} accepted, {} rejected",
        miner.accepted_shares, miner.rejected_shares
    ));
    lines.push(format!(
        "   Uptime:        {}s ({})",
        miner.uptime_s, miner.uptime_formatted
    ));
    lines.push(format!("   WiFi RSSI:     {} dBm", miner.wifi_rssi));
    lines.push(format!(
        "   Pool:          {} as {}",
        miner.pool_url, miner.worker_name
    ));
    lines.push(format!(
        "   Hardware:      {} board {} firmware {}",
        miner.asic_model, miner.board_version, miner.firmware_version
    ));
    lines
}
