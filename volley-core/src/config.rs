use crate::{
    FailurePolicy, DEFAULT_EXPECTED_STATUS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_VIRTUAL_USERS,
};
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while validating a scenario. Always fatal, and always raised before any
/// virtual user is launched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("No target URL was provided")]
    MissingUrl,

    #[error("Invalid target URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme `{0}`; only http and https are supported")]
    UnsupportedScheme(String),

    #[error("Virtual user count must be at least 1")]
    NonPositiveVirtualUsers,

    #[error("Duration must be greater than zero")]
    ZeroDuration,

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Iteration count must be greater than zero")]
    ZeroIterations,

    #[error("Request rate limit must be greater than zero")]
    ZeroRate,

    #[error("Expected status {0} is not a valid HTTP status code")]
    InvalidStatus(u16),

    #[error("Failure rate threshold {0} is outside of [0, 1]")]
    InvalidFailureRate(f64),

    #[error("Unrecognized failure policy `{0}`; expected `never`, `any`, or a rate in [0, 1]")]
    InvalidPolicy(String),
}

/// A validated load test scenario.
///
/// Immutable once built. Use [`ScenarioConfig::builder`] to create one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    target_url: Url,
    virtual_users: NonZeroUsize,
    duration: Option<Duration>,
    sleep_interval: Duration,
    request_timeout: Duration,
    iterations: Option<NonZeroU64>,
    max_rps: Option<NonZeroU32>,
    expected_status: u16,
    failure_policy: FailurePolicy,
}

impl ScenarioConfig {
    pub fn builder() -> ScenarioConfigBuilder {
        ScenarioConfigBuilder::default()
    }

    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    pub fn virtual_users(&self) -> NonZeroUsize {
        self.virtual_users
    }

    /// `None` means the scenario is not time-bounded.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn sleep_interval(&self) -> Duration {
        self.sleep_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn iterations(&self) -> Option<NonZeroU64> {
        self.iterations
    }

    pub fn max_rps(&self) -> Option<NonZeroU32> {
        self.max_rps
    }

    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// How many iterations each virtual user runs before stopping on its own.
    ///
    /// A scenario with neither a duration nor an iteration cap runs every virtual user once.
    pub fn iterations_per_user(&self) -> Option<u64> {
        match (self.iterations, self.duration) {
            (Some(iterations), _) => Some(iterations.get()),
            (None, None) => Some(1),
            (None, Some(_)) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioConfigBuilder {
    target_url: Option<String>,
    virtual_users: Option<usize>,
    duration: Option<Duration>,
    sleep_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    iterations: Option<u64>,
    max_rps: Option<u32>,
    expected_status: Option<u16>,
    failure_policy: Option<FailurePolicy>,
}

impl ScenarioConfigBuilder {
    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    pub fn virtual_users(mut self, virtual_users: usize) -> Self {
        self.virtual_users = Some(virtual_users);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn sleep_interval(mut self, sleep_interval: Duration) -> Self {
        self.sleep_interval = Some(sleep_interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn max_rps(mut self, max_rps: u32) -> Self {
        self.max_rps = Some(max_rps);
        self
    }

    pub fn expected_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<ScenarioConfig, ConfigError> {
        let raw_url = self.target_url.ok_or(ConfigError::MissingUrl)?;
        let target_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            url: raw_url.clone(),
            source,
        })?;
        if !matches!(target_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(
                target_url.scheme().to_string(),
            ));
        }

        let virtual_users = match self.virtual_users {
            Some(count) => NonZeroUsize::new(count).ok_or(ConfigError::NonPositiveVirtualUsers)?,
            None => DEFAULT_VIRTUAL_USERS,
        };

        if self.duration == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration);
        }

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let iterations = self
            .iterations
            .map(|n| NonZeroU64::new(n).ok_or(ConfigError::ZeroIterations))
            .transpose()?;
        let max_rps = self
            .max_rps
            .map(|n| NonZeroU32::new(n).ok_or(ConfigError::ZeroRate))
            .transpose()?;

        let expected_status = self.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS);
        if !(100..=599).contains(&expected_status) {
            return Err(ConfigError::InvalidStatus(expected_status));
        }

        let failure_policy = self.failure_policy.unwrap_or_default().validate()?;

        Ok(ScenarioConfig {
            target_url,
            virtual_users,
            duration: self.duration,
            sleep_interval: self.sleep_interval.unwrap_or_default(),
            request_timeout,
            iterations,
            max_rps,
            expected_status,
            failure_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ScenarioConfigBuilder {
        ScenarioConfig::builder().target_url("http://0.0.0.0:8090/books/")
    }

    #[test]
    fn defaults() {
        let config = base().build().unwrap();
        assert_eq!(config.virtual_users().get(), 1);
        assert_eq!(config.duration(), None);
        assert_eq!(config.sleep_interval(), Duration::ZERO);
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.expected_status(), 200);
        assert_eq!(config.failure_policy(), FailurePolicy::Never);
        assert_eq!(config.iterations_per_user(), Some(1));
    }

    #[test]
    fn source_script_options() {
        let config = base()
            .virtual_users(250)
            .duration(Duration::from_secs(30))
            .sleep_interval(Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(config.virtual_users().get(), 250);
        assert_eq!(config.duration(), Some(Duration::from_secs(30)));
        assert_eq!(config.iterations_per_user(), None);
        assert_eq!(config.target_url().path(), "/books/");
    }

    #[test]
    fn iteration_cap_wins_over_duration() {
        let config = base()
            .duration(Duration::from_secs(30))
            .iterations(7)
            .build()
            .unwrap();
        assert_eq!(config.iterations_per_user(), Some(7));
    }

    #[test]
    fn zero_virtual_users() {
        let err = base().virtual_users(0).build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveVirtualUsers);
    }

    #[test]
    fn missing_url() {
        let err = ScenarioConfig::builder().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingUrl);
    }

    #[test]
    fn invalid_url() {
        let err = ScenarioConfig::builder()
            .target_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn unsupported_scheme() {
        let err = ScenarioConfig::builder()
            .target_url("ftp://example.com/")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn zero_values_rejected() {
        assert_eq!(
            base().duration(Duration::ZERO).build().unwrap_err(),
            ConfigError::ZeroDuration
        );
        assert_eq!(
            base().request_timeout(Duration::ZERO).build().unwrap_err(),
            ConfigError::ZeroTimeout
        );
        assert_eq!(
            base().iterations(0).build().unwrap_err(),
            ConfigError::ZeroIterations
        );
        assert_eq!(base().max_rps(0).build().unwrap_err(), ConfigError::ZeroRate);
    }

    #[test]
    fn bad_expected_status() {
        assert_eq!(
            base().expected_status(42).build().unwrap_err(),
            ConfigError::InvalidStatus(42)
        );
    }

    #[test]
    fn bad_failure_rate() {
        let err = base()
            .failure_policy(FailurePolicy::MaxFailureRate(1.5))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidFailureRate(1.5));
    }
}
