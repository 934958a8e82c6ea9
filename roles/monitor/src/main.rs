use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use miner_client::poll_loop;
use tracing::info;

use bitaxe_monitor::api::{run_http_server, ApiState};
use bitaxe_monitor::config::{CliArgs, Config};
use bitaxe_monitor::MetricsCollector;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::from_env_args()?;

    // Setup tracing with optional file output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt().with_env_filter(env_filter);

    if let Some(log_file) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| format!("Failed to open log file {}: {}", log_file, e))?;
        fmt_layer.with_writer(Arc::new(file)).init();
    } else {
        fmt_layer.init();
    }

    let config = Config::from_process_env(&cli)?.monitor;

    info!("Starting Bitaxe monitor for {} miners", config.miners.len());
    for miner in &config.miners {
        info!("  {} at {}:{}", miner.name, miner.ip, miner.port);
    }
    info!("Poll interval: {}s", config.polling.interval_secs);
    info!("Variance windows: {:?}", config.variance.windows);
    info!("Data directory: {}", config.storage.data_dir);

    let collector = Arc::new(MetricsCollector::open(&config).await?);
    info!("Logging metrics to {}", collector.csv_path().display());

    let poll_interval = Duration::from_secs(config.polling.interval_secs);

    // Spawn polling loop
    let poller = collector.clone();
    tokio::spawn(async move {
        poll_loop(poll_interval, move || {
            let collector = poller.clone();
            async move {
                collector.collect_all().await;
                ControlFlow::Continue(())
            }
        })
        .await;
    });

    let state = Arc::new(ApiState {
        collector,
        poll_interval,
    });

    tokio::select! {
        result = run_http_server(config.web.listen_address.clone(), state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
