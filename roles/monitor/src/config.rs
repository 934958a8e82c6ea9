use std::env;

use shared_config::MonitorGlobalConfig;

/// Command line overrides. Everything is optional; without `--config` the
/// monitor starts from defaults plus environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub config_path: Option<String>,
    pub log_file: Option<String>,
    pub web_address: Option<String>,
    pub data_dir: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub detailed: bool,
}

fn flag_value(args: &[String], long: &str, short: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == long || arg == short)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

impl CliArgs {
    pub fn from_env_args() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();
        Self::parse(&args)
    }

    pub fn parse(args: &[String]) -> Result<Self, String> {
        let poll_interval_secs = match flag_value(args, "--poll-interval", "-p") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| format!("Invalid --poll-interval: {}", raw))?,
            ),
            None => None,
        };

        Ok(Self {
            config_path: flag_value(args, "--config", "-c"),
            log_file: flag_value(args, "--log-file", "-f"),
            web_address: flag_value(args, "--web-address", "-w"),
            data_dir: flag_value(args, "--data-dir", "-d"),
            poll_interval_secs,
            detailed: args.iter().any(|arg| arg == "--detailed"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub monitor: MonitorGlobalConfig,
}

impl Config {
    pub fn from_process_env(cli: &CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        Self::load(cli, |key| env::var(key).ok())
    }

    /// Layer file, environment and command line, in increasing precedence,
    /// then validate the result.
    pub fn load<F>(cli: &CliArgs, env_lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut monitor = match &cli.config_path {
            Some(path) => MonitorGlobalConfig::from_path(path)?,
            None => MonitorGlobalConfig::default(),
        };

        monitor.apply_env(env_lookup);

        if let Some(address) = &cli.web_address {
            monitor.web.listen_address = address.clone();
        }
        if let Some(dir) = &cli.data_dir {
            monitor.storage.data_dir = dir.clone();
        }
        if let Some(secs) = cli.poll_interval_secs {
            monitor.polling.interval_secs = secs;
        }
        if cli.detailed {
            monitor.display.show_detailed = true;
        }

        monitor.validate()?;

        Ok(Self { monitor })
    }
}
