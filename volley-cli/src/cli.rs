use crate::file::ConfigFile;
use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use volley_core::{FailurePolicy, ScenarioConfig, ScenarioConfigBuilder};

/// Flat virtual-user HTTP load testing.
///
/// Every virtual user repeatedly GETs the target URL, checks the response status, and sleeps
/// before its next iteration. Flags override values from `--config`.
#[derive(Parser, Debug)]
#[command(name = "volley", version)]
pub struct VolleyCli {
    /// URL to send GET requests to
    pub url: Option<String>,

    /// Scenario file (.toml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of virtual users [default: 1]
    #[arg(short = 'u', long = "vus")]
    pub virtual_users: Option<usize>,

    /// How long to run, e.g. `30s` [default: one iteration per virtual user]
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Pause between iterations, e.g. `1s` [default: 0s]
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub sleep: Option<Duration>,

    /// Per-request timeout [default: 60s]
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Iterations per virtual user
    #[arg(short, long)]
    pub iterations: Option<u64>,

    /// Maximum requests per second across all virtual users
    #[arg(long)]
    pub max_rps: Option<u32>,

    /// Status code the check expects [default: 200]
    #[arg(long)]
    pub expected_status: Option<u16>,

    /// When failed checks fail the run: `never`, `any`, or a maximum failure rate in [0, 1]
    /// [default: never]
    #[arg(long)]
    pub threshold: Option<FailurePolicy>,

    /// Also write the summary as JSON to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while running
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl VolleyCli {
    /// Layers the scenario file (if any) under the command line flags and validates the result.
    pub fn scenario_config(&self) -> anyhow::Result<ScenarioConfig> {
        let mut builder = ScenarioConfig::builder();
        if let Some(path) = &self.config {
            let file = ConfigFile::load(path)
                .with_context(|| format!("Failed to load scenario file {}", path.display()))?;
            builder = file.apply(builder);
        }

        Ok(self.apply(builder).build()?)
    }

    fn apply(&self, mut builder: ScenarioConfigBuilder) -> ScenarioConfigBuilder {
        if let Some(url) = &self.url {
            builder = builder.target_url(url.clone());
        }
        if let Some(virtual_users) = self.virtual_users {
            builder = builder.virtual_users(virtual_users);
        }
        if let Some(duration) = self.duration {
            builder = builder.duration(duration);
        }
        if let Some(sleep) = self.sleep {
            builder = builder.sleep_interval(sleep);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.request_timeout(timeout);
        }
        if let Some(iterations) = self.iterations {
            builder = builder.iterations(iterations);
        }
        if let Some(max_rps) = self.max_rps {
            builder = builder.max_rps(max_rps);
        }
        if let Some(status) = self.expected_status {
            builder = builder.expected_status(status);
        }
        if let Some(policy) = self.threshold {
            builder = builder.failure_policy(policy);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_core::ConfigError;

    fn parse(args: &[&str]) -> VolleyCli {
        VolleyCli::try_parse_from(std::iter::once("volley").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn source_script_flags() {
        let config = parse(&[
            "http://0.0.0.0:8090/books/",
            "--vus",
            "250",
            "--duration",
            "30s",
            "--sleep",
            "1s",
        ])
        .scenario_config()
        .unwrap();

        assert_eq!(config.virtual_users().get(), 250);
        assert_eq!(config.duration(), Some(Duration::from_secs(30)));
        assert_eq!(config.sleep_interval(), Duration::from_secs(1));
        assert_eq!(config.failure_policy(), FailurePolicy::Never);
    }

    #[test]
    fn short_flags_and_threshold() {
        let cli = parse(&[
            "http://localhost/",
            "-u",
            "3",
            "-d",
            "1m 30s",
            "-i",
            "5",
            "--threshold",
            "0.1",
        ]);
        assert_eq!(cli.threshold, Some(FailurePolicy::MaxFailureRate(0.1)));

        let config = cli.scenario_config().unwrap();
        assert_eq!(config.duration(), Some(Duration::from_secs(90)));
        assert_eq!(config.iterations_per_user(), Some(5));
    }

    #[test]
    fn bad_threshold_is_a_usage_error() {
        let res = VolleyCli::try_parse_from(["volley", "http://localhost/", "--threshold", "2"]);
        assert!(res.is_err());
    }

    #[test]
    fn zero_virtual_users_is_a_config_error() {
        let err = parse(&["http://localhost/", "--vus", "0"])
            .scenario_config()
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::NonPositiveVirtualUsers)
        );
    }

    #[test]
    fn url_is_required() {
        let err = parse(&["--vus", "2"]).scenario_config().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingUrl)
        );
    }

    #[test]
    fn flags_override_file() {
        let file = ConfigFile {
            target_url: Some("http://from-file/".to_string()),
            virtual_users: Some(10),
            duration: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let cli = parse(&["--vus", "2"]);
        let config = cli
            .apply(file.apply(ScenarioConfig::builder()))
            .build()
            .unwrap();

        assert_eq!(config.target_url().as_str(), "http://from-file/");
        assert_eq!(config.virtual_users().get(), 2);
        assert_eq!(config.duration(), Some(Duration::from_secs(30)));
    }
}
