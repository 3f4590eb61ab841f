mod cli;
mod file;
mod report;

use clap::Parser;
use cli::VolleyCli;
use metrics_exporter_prometheus::PrometheusBuilder;
use report::Summary;
use std::process::ExitCode;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use volley::run_scenario;

const DEFAULT_LOG_FILTER: &str = "volley=info,volley_cli=info";

const EXIT_INTERNAL_ERROR: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_THRESHOLD_FAILED: u8 = 99;

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = VolleyCli::parse();

    let config = match args.scenario_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Some(addr) = args.metrics_addr {
        if let Err(err) = PrometheusBuilder::new().with_http_listener(addr).install() {
            error!("Unable to start the metrics exporter on {addr}: {err}");
            return ExitCode::from(EXIT_INTERNAL_ERROR);
        }
        info!("Serving metrics on {addr}");
    }

    let policy = config.failure_policy();
    let stats = match run_scenario(config, shutdown_signal()).await {
        Ok(stats) => stats,
        Err(err) if err.is_config() => {
            error!("{err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
        Err(err) => {
            error!("Run aborted: {err}");
            return ExitCode::from(EXIT_INTERNAL_ERROR);
        }
    };

    println!("{stats}");

    let summary = Summary::new(&stats, policy);
    if let Some(path) = &args.summary_json {
        if let Err(err) = summary.write_json(path) {
            error!("Unable to write summary to {}: {err:#}", path.display());
            return ExitCode::from(EXIT_INTERNAL_ERROR);
        }
    }

    if summary.policy_violated {
        warn!("Failure policy ({policy}) violated");
        return ExitCode::from(EXIT_THRESHOLD_FAILED);
    }

    ExitCode::SUCCESS
}

/// Resolves on Ctrl-C, which drains the run early.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}
