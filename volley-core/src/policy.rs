use crate::{AggregateStats, ConfigError};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Decides whether a completed run counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Failed checks are reported but never fail the run.
    #[default]
    Never,
    /// A single failed check fails the run.
    AnyFailure,
    /// The run fails when the share of failed checks exceeds the given rate.
    MaxFailureRate(f64),
}

impl FailurePolicy {
    pub fn validate(self) -> Result<Self, ConfigError> {
        match self {
            FailurePolicy::MaxFailureRate(rate) if !(0.0..=1.0).contains(&rate) => {
                Err(ConfigError::InvalidFailureRate(rate))
            }
            policy => Ok(policy),
        }
    }

    pub fn is_violated(&self, stats: &AggregateStats) -> bool {
        match self {
            FailurePolicy::Never => false,
            FailurePolicy::AnyFailure => stats.failed_checks > 0,
            FailurePolicy::MaxFailureRate(rate) => stats.failure_rate() > *rate,
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" | "none" => Ok(FailurePolicy::Never),
            "any" => Ok(FailurePolicy::AnyFailure),
            other => other
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidPolicy(s.to_string()))
                .and_then(|rate| FailurePolicy::MaxFailureRate(rate).validate()),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Never => write!(f, "never"),
            FailurePolicy::AnyFailure => write!(f, "any"),
            FailurePolicy::MaxFailureRate(rate) => write!(f, "failure rate <= {rate}"),
        }
    }
}
