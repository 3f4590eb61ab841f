//! Scenario entry points
use crate::driver::ConcurrencyDriver;
use crate::error::HarnessError;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use volley_core::{FailurePolicy, RunStatistics, ScenarioConfig, ScenarioConfigBuilder};

type RunnerFuture = Pin<Box<dyn Future<Output = Result<RunStatistics, HarnessError>> + Send>>;

/// Load test scenario
///
/// Configure with the [`ConfigurableScenario`] methods, then `.await` it. The configuration is
/// validated when the scenario is first polled; a [`HarnessError::Config`] is returned before
/// any request is sent if it is invalid.
pub struct Scenario {
    builder: ScenarioConfigBuilder,
    runner_fut: Option<RunnerFuture>,
}

impl Scenario {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self::from_builder(ScenarioConfig::builder().target_url(target_url))
    }

    pub fn from_builder(builder: ScenarioConfigBuilder) -> Self {
        Self {
            builder,
            runner_fut: None,
        }
    }

    fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ScenarioConfigBuilder) -> ScenarioConfigBuilder,
    {
        self.builder = f(self.builder);
        self
    }
}

impl Future for Scenario {
    type Output = Result<RunStatistics, HarnessError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let builder = &this.builder;
        let runner = this.runner_fut.get_or_insert_with(|| {
            let builder = builder.clone();
            Box::pin(async move {
                let config = builder.build()?;
                run_scenario(config, std::future::pending()).await
            })
        });

        runner.as_mut().poll(cx)
    }
}

/// Builder methods for a scenario. Changes made after the scenario was first polled have no
/// effect.
pub trait ConfigurableScenario: Future + Sized + Send {
    /// Number of virtual users launched at once. Defaults to 1.
    fn virtual_users(self, virtual_users: usize) -> Self;

    /// How long the scenario runs. Without one, every virtual user runs a single iteration.
    ///
    /// # Example
    /// ```no_run
    /// use volley::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = Scenario::new("http://localhost:8090/books/")
    ///         .virtual_users(10)
    ///         .duration(Duration::from_secs(120))
    ///         .await;
    /// }
    /// ```
    fn duration(self, duration: Duration) -> Self;

    /// Pause between two iterations of the same virtual user.
    fn sleep(self, sleep_interval: Duration) -> Self;

    /// Per-request timeout. Requests exceeding it are recorded as failed checks.
    fn timeout(self, timeout: Duration) -> Self;

    /// Caps how many iterations each virtual user runs.
    fn iterations(self, iterations: u64) -> Self;

    /// Caps the request rate across all virtual users.
    fn max_rps(self, max_rps: u32) -> Self;

    /// Status code the check expects. Defaults to 200.
    fn expected_status(self, status: u16) -> Self;

    fn failure_policy(self, policy: FailurePolicy) -> Self;
}

impl ConfigurableScenario for Scenario {
    fn virtual_users(self, virtual_users: usize) -> Self {
        self.configure(|b| b.virtual_users(virtual_users))
    }

    fn duration(self, duration: Duration) -> Self {
        self.configure(|b| b.duration(duration))
    }

    fn sleep(self, sleep_interval: Duration) -> Self {
        self.configure(|b| b.sleep_interval(sleep_interval))
    }

    fn timeout(self, timeout: Duration) -> Self {
        self.configure(|b| b.request_timeout(timeout))
    }

    fn iterations(self, iterations: u64) -> Self {
        self.configure(|b| b.iterations(iterations))
    }

    fn max_rps(self, max_rps: u32) -> Self {
        self.configure(|b| b.max_rps(max_rps))
    }

    fn expected_status(self, status: u16) -> Self {
        self.configure(|b| b.expected_status(status))
    }

    fn failure_policy(self, policy: FailurePolicy) -> Self {
        self.configure(|b| b.failure_policy(policy))
    }
}

/// Runs a validated scenario to completion, draining early once `shutdown` resolves.
#[instrument(
    name = "scenario",
    skip_all,
    fields(url = %config.target_url(), vus = config.virtual_users().get())
)]
pub async fn run_scenario<S>(
    config: ScenarioConfig,
    shutdown: S,
) -> Result<RunStatistics, HarnessError>
where
    S: Future<Output = ()> + Send,
{
    info!("Running scenario with config {:?}", &config);

    let driver = ConcurrencyDriver::new(config);
    let stats = driver.run(shutdown).await?;

    info!("Scenario complete");
    Ok(stats)
}
