//! Scenario files.
//!
//! TOML or JSON, picked by file extension. Every key is optional; spans use humantime syntax
//! (`30s`, `1m 30s`).
//!
//! ```toml
//! target_url = "http://0.0.0.0:8090/books/"
//! virtual_users = 250
//! duration = "30s"
//! sleep_interval = "1s"
//! ```
use serde::{de::Error as _, Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use volley_core::{FailurePolicy, ScenarioConfigBuilder};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML scenario file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON scenario file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized scenario file extension for {0}; expected .toml or .json")]
    UnknownFormat(PathBuf),
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub target_url: Option<String>,
    pub virtual_users: Option<usize>,
    #[serde(default, deserialize_with = "span")]
    pub duration: Option<Duration>,
    #[serde(default, deserialize_with = "span")]
    pub sleep_interval: Option<Duration>,
    #[serde(default, deserialize_with = "span")]
    pub timeout: Option<Duration>,
    pub iterations: Option<u64>,
    pub max_rps: Option<u32>,
    pub expected_status: Option<u16>,
    #[serde(default, deserialize_with = "policy")]
    pub threshold: Option<FailurePolicy>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, FileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&contents)?),
            Some("json") => Ok(serde_json::from_str(&contents)?),
            _ => Err(FileError::UnknownFormat(path.to_path_buf())),
        }
    }

    /// Copies every value present in the file onto the builder.
    pub fn apply(self, mut builder: ScenarioConfigBuilder) -> ScenarioConfigBuilder {
        if let Some(url) = self.target_url {
            builder = builder.target_url(url);
        }
        if let Some(virtual_users) = self.virtual_users {
            builder = builder.virtual_users(virtual_users);
        }
        if let Some(duration) = self.duration {
            builder = builder.duration(duration);
        }
        if let Some(sleep_interval) = self.sleep_interval {
            builder = builder.sleep_interval(sleep_interval);
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

fn span<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| humantime::parse_duration(&raw).map_err(D::Error::custom))
        .transpose()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPolicy {
    Rate(f64),
    Named(String),
}

fn policy<'de, D>(deserializer: D) -> Result<Option<FailurePolicy>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawPolicy>::deserialize(deserializer)?
        .map(|raw| match raw {
            RawPolicy::Rate(rate) => FailurePolicy::MaxFailureRate(rate).validate(),
            RawPolicy::Named(name) => name.parse(),
        })
        .transpose()
        .map_err(D::Error::custom)
}
