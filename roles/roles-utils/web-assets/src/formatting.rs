/// Format a hashrate given in GH/s, switching to TH/s from 1000 GH/s up.
pub fn format_hashrate_gh(gh: f64) -> String {
    if !gh.is_finite() || gh <= 0.0 {
        return "0.0 GH/s".to_string();
    }
    if gh >= 1000.0 {
        format!("{:.2} TH/s", gh / 1000.0)
    } else {
        format!("{:.1} GH/s", gh)
    }
}

/// Compact uptime such as "3d 4h 5m". Leading zero units are dropped.
pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    if seconds < 60 {
        return "<1m".to_string();
    }

    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Age of `timestamp` relative to `now`, both unix seconds.
pub fn format_elapsed_time(now: u64, timestamp: u64) -> String {
    let elapsed = now.saturating_sub(timestamp);
    if elapsed < 60 {
        format!("{}s ago", elapsed)
    } else if elapsed < 3600 {
        format!("{}m ago", elapsed / 60)
    } else if elapsed < 86400 {
        format!("{}h ago", elapsed / 3600)
    } else {
        format!("{}d ago", elapsed / 86400)
    }
}
