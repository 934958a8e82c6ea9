//! Plain-text variance reports.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::storage::{Result, VarianceAnalytics};
use crate::types::format_utc;

const RULE_WIDTH: usize = 60;
const REPORTED_PERIODS: usize = 5;

pub struct VarianceReport<'a> {
    pub analytics: &'a VarianceAnalytics,
    pub days: u32,
    pub generated_at: u64,
}

impl VarianceReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let a = self.analytics;

        // Writing into a String cannot fail
        let _ = writeln!(out, "Variance Analysis Report for {}", a.miner_name);
        let _ = writeln!(out, "Analysis Period: {} days", self.days);
        let _ = writeln!(
            out,
            "Generated: {}",
            format_utc(self.generated_at, "%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
        let _ = writeln!(out);
        let _ = writeln!(out, "Variance Trends by Time Window:");

        for trend in &a.variance_trends {
            let _ = writeln!(out, "  {}s window:", trend.window_seconds);
            let _ = writeln!(
                out,
                "    Average Positive Variance: {}",
                gh_or_na(trend.avg_positive_variance)
            );
            let _ = writeln!(
                out,
                "    Average Negative Variance: {}",
                gh_or_na(trend.avg_negative_variance)
            );
            let _ = writeln!(
                out,
                "    Average Stability Score: {:.1}/100",
                trend.avg_stability
            );
            let _ = writeln!(out, "    Sample Count: {}", trend.sample_count);
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "Worst Stability Periods:");
        let _ = write!(out, "  Timestamp        | Window | Score | Deviation");
        for period in a.worst_stability_periods.iter().take(REPORTED_PERIODS) {
            let _ = write!(
                out,
                "\n  {} | {:>3}s  | {:>5.1} | {:>+6.1} GH/s",
                format_utc(period.timestamp, "%Y-%m-%d %H:%M"),
                period.window_seconds,
                period.stability_score,
                period.deviation_gh
            );
        }

        out
    }

    /// Write the rendered report into `data_dir` and return its path.
    pub fn write_to(&self, data_dir: &Path) -> Result<PathBuf> {
        let filename = format!(
            "variance_report_{}_{}.txt",
            file_safe(&self.analytics.miner_name),
            format_utc(self.generated_at, "%Y%m%d_%H%M%S")
        );
        let path = data_dir.join(filename);
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}

fn gh_or_na(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2} GH/s", v),
        None => "N/A".to_string(),
    }
}

/// Miner names come from URLs; keep them from escaping the data directory.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
