use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use tracing::warn;

const DEFAULT_MINER_PORT: u16 = 80;

fn default_port() -> u16 {
    DEFAULT_MINER_PORT
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MinerConfig {
    pub name: String,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overrides the ASIC-derived baseline, GH/s
    #[serde(default)]
    pub expected_hashrate_gh: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            request_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct VarianceConfig {
    pub windows: Vec<u64>,
    pub retention_secs: u64,
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            windows: vec![60, 300, 600],
            retention_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    pub listen_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Relative paths are resolved under `data_dir`
    pub metrics_csv: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            metrics_csv: "bitaxe_monitor_data.csv".to_string(),
        }
    }
}

/// Per-tick fleet summary in the log.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Also log a full block per online miner
    pub show_detailed: bool,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct MonitorGlobalConfig {
    #[serde(default)]
    pub miners: Vec<MinerConfig>,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub variance: VarianceConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl MonitorGlobalConfig {
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(path, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Apply the Docker-style environment variables from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `MINER_NAMES`/`MINER_IPS`/`MINER_PORTS` are comma-separated and matched
    /// by position; when either of the first two is set they replace the
    /// configured miner list. `EXPECTED_HASHRATES` is `name:gh,name:gh`.
    /// Values that do not parse are logged and skipped.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let names = lookup("MINER_NAMES");
        let ips = lookup("MINER_IPS");
        if names.is_some() || ips.is_some() {
            self.miners = miners_from_env(
                names.as_deref().unwrap_or(""),
                ips.as_deref().unwrap_or(""),
                lookup("MINER_PORTS").as_deref().unwrap_or(""),
            );
        }

        if let Some(pairs) = lookup("EXPECTED_HASHRATES") {
            for (name, gh) in parse_expected_hashrates(&pairs) {
                match self.miners.iter_mut().find(|m| m.name == name) {
                    Some(miner) => miner.expected_hashrate_gh = Some(gh),
                    None => warn!("EXPECTED_HASHRATES names unknown miner {}", name),
                }
            }
        }

        if let Some(raw) = lookup("POLL_INTERVAL") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.polling.interval_secs = secs,
                Err(_) => warn!("Ignoring invalid POLL_INTERVAL {:?}", raw),
            }
        }

        // Containers need to listen on all interfaces
        if let Some(raw) = lookup("WEB_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.web.listen_address = format!("0.0.0.0:{}", port),
                Err(_) => warn!("Ignoring invalid WEB_PORT {:?}", raw),
            }
        }

        if let Some(path) = lookup("DATA_FILE") {
            if !path.trim().is_empty() {
                self.storage.metrics_csv = path.trim().to_string();
            }
        }

        if let Some(raw) = lookup("SHOW_DETAILED") {
            self.display.show_detailed = raw.trim().eq_ignore_ascii_case("true");
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.miners.is_empty() {
            return Err("At least one miner must be configured".to_string());
        }
        for miner in &self.miners {
            if miner.name.trim().is_empty() || miner.ip.trim().is_empty() {
                return Err(format!("Miner {:?} needs a name and an ip", miner.name));
            }
            if let Some(gh) = miner.expected_hashrate_gh {
                if !(gh > 0.0) {
                    return Err(format!(
                        "Expected hashrate for {} must be positive, got {}",
                        miner.name, gh
                    ));
                }
            }
        }
        let mut names: Vec<&str> = self.miners.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err("Miner names must be unique".to_string());
        }

        if self.polling.interval_secs == 0 {
            return Err("polling.interval_secs must be positive".to_string());
        }
        if self.variance.windows.is_empty() {
            return Err("variance.windows must not be empty".to_string());
        }
        if self.variance.windows.contains(&0) {
            return Err("variance.windows must all be positive".to_string());
        }
        let largest = self.variance.windows.iter().copied().max().unwrap_or(0);
        if self.variance.retention_secs < largest {
            return Err(format!(
                "variance.retention_secs ({}) must cover the largest window ({})",
                self.variance.retention_secs, largest
            ));
        }
        Ok(())
    }

    pub fn metrics_csv_path(&self) -> PathBuf {
        let csv = PathBuf::from(&self.storage.metrics_csv);
        if csv.is_absolute() {
            csv
        } else {
            PathBuf::from(&self.storage.data_dir).join(csv)
        }
    }

    /// Configured baseline overrides by miner name.
    pub fn expected_hashrates(&self) -> HashMap<String, f64> {
        self.miners
            .iter()
            .filter_map(|m| m.expected_hashrate_gh.map(|gh| (m.name.clone(), gh)))
            .collect()
    }
}

fn miners_from_env(names: &str, ips: &str, ports: &str) -> Vec<MinerConfig> {
    let ips: Vec<&str> = ips.split(',').map(str::trim).collect();
    let ports: Vec<&str> = ports.split(',').map(str::trim).collect();

    names
        .split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .filter_map(|(i, name)| {
            let ip = match ips.get(i) {
                Some(ip) if !ip.is_empty() => ip.to_string(),
                _ => {
                    warn!("MINER_IPS has no address for {}; skipping", name);
                    return None;
                }
            };
            let port = match ports.get(i) {
                Some(p) if !p.is_empty() => p.parse().unwrap_or_else(|_| {
                    warn!("Invalid port {:?} for {}; using {}", p, name, DEFAULT_MINER_PORT);
                    DEFAULT_MINER_PORT
                }),
                _ => DEFAULT_MINER_PORT,
            };
            Some(MinerConfig {
                name: name.to_string(),
                ip,
                port,
                expected_hashrate_gh: None,
            })
        })
        .collect()
}

fn parse_expected_hashrates(pairs: &str) -> Vec<(String, f64)> {
    pairs
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let parsed = pair
                .split_once(':')
                .and_then(|(name, gh)| Some((name.trim().to_string(), gh.trim().parse().ok()?)));
            if parsed.is_none() {
                warn!("Skipping invalid EXPECTED_HASHRATES entry {:?}", pair);
            }
            parsed
        })
        .collect()
}
