//! Launches and retires the virtual users of a scenario.
use crate::collector::ResultCollector;
use crate::error::HarnessError;
use crate::runner::{http_client, StopSignal, VirtualUser};
use futures_util::future::join_all;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval_at, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use volley_core::{RunStatistics, ScenarioConfig};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle of a [`ConcurrencyDriver`].
///
/// `Idle → Running → Draining → Stopped`, with no skipped steps. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl DriverState {
    pub fn can_transition_to(self, next: DriverState) -> bool {
        matches!(
            (self, next),
            (DriverState::Idle, DriverState::Running)
                | (DriverState::Running, DriverState::Draining)
                | (DriverState::Draining, DriverState::Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == DriverState::Stopped
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Idle => "idle",
            DriverState::Running => "running",
            DriverState::Draining => "draining",
            DriverState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Runs every virtual user of a scenario concurrently for the configured duration.
///
/// A driver runs once. Its state can be observed from other tasks through
/// [`ConcurrencyDriver::subscribe`].
pub struct ConcurrencyDriver {
    config: Arc<ScenarioConfig>,
    collector: Arc<ResultCollector>,
    state: watch::Sender<DriverState>,
}

impl ConcurrencyDriver {
    pub fn new(config: ScenarioConfig) -> Self {
        Self::with_collector(config, Arc::new(ResultCollector::new()))
    }

    pub fn with_collector(config: ScenarioConfig, collector: Arc<ResultCollector>) -> Self {
        let (state, _) = watch::channel(DriverState::Idle);
        Self {
            config: Arc::new(config),
            collector,
            state,
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn collector(&self) -> &Arc<ResultCollector> {
        &self.collector
    }

    pub fn state(&self) -> DriverState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    fn transition(&self, next: DriverState) -> Result<(), HarnessError> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        info!("Driver {current} -> {next}");
        self.state.send_replace(next);
        Ok(())
    }

    /// Launches every virtual user at once and drains them when the duration elapses, when
    /// `shutdown` resolves, or when they all run out of iterations, whichever comes first.
    pub async fn run<S>(&self, shutdown: S) -> Result<RunStatistics, HarnessError>
    where
        S: Future<Output = ()>,
    {
        #[cfg(feature = "metrics")]
        crate::collector::describe_metrics();

        let stop = StopSignal::new();
        let limiter = self
            .config
            .max_rps()
            .map(|max_rps| Arc::new(rate_limiter(max_rps)));

        let virtual_users = self.config.virtual_users().get();
        // NOTE: Clients are built up front so that failures surface before anything is sent.
        let users = (0..virtual_users)
            .map(|id| {
                let client = http_client(&self.config).map_err(HarnessError::Client)?;
                Ok(VirtualUser::new(
                    id,
                    client,
                    self.config.clone(),
                    self.collector.clone(),
                    limiter.clone(),
                    stop.clone(),
                ))
            })
            .collect::<Result<Vec<_>, HarnessError>>()?;

        self.transition(DriverState::Running)?;
        let start = Instant::now();

        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
                let span = info_span!("vu", id = user.id());
                tokio::spawn(user.run().instrument(span))
            })
            .collect();

        let mut all_done = pin!(join_all(handles));
        let mut deadline = pin!(run_for(self.config.duration()));
        let mut shutdown = pin!(shutdown);
        let mut progress = interval_at(
            tokio::time::Instant::now() + PROGRESS_INTERVAL,
            PROGRESS_INTERVAL,
        );
        progress.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = start;
        let mut last_total = 0;

        let finished = loop {
            tokio::select! {
                results = &mut all_done => {
                    info!("All virtual users finished their iterations");
                    break Some(results);
                }
                _ = &mut deadline => {
                    info!("Scenario duration elapsed");
                    break None;
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break None;
                }
                _ = progress.tick() => {
                    let now = Instant::now();
                    last_total = self.log_progress(start.elapsed(), now - last_tick, last_total);
                    last_tick = now;
                }
            }
        };

        self.transition(DriverState::Draining)?;
        stop.trigger();
        let results = match finished {
            Some(results) => results,
            None => all_done.await,
        };
        let elapsed = start.elapsed();
        self.transition(DriverState::Stopped)?;

        let mut iterations = 0;
        for (id, res) in results.into_iter().enumerate() {
            iterations += res.map_err(|source| HarnessError::Join { id, source })??;
        }

        let stats = self.collector.snapshot()?;
        info!(
            "Completed {iterations} iterations ({} requests) in {}",
            stats.total_requests,
            humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
        );

        Ok(RunStatistics {
            virtual_users,
            elapsed,
            iterations,
            stats,
        })
    }

    fn log_progress(&self, elapsed: Duration, window: Duration, last_total: u64) -> u64 {
        let total = self.collector.total_requests();
        let rate = (total - last_total) as f64 / window.as_secs_f64();
        info!(
            "[{}] {total} requests ({} failed checks), {rate:.2}/s",
            humantime::format_duration(Duration::from_secs(elapsed.as_secs())),
            self.collector.failed_checks(),
        );
        total
    }
}

async fn run_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn rate_limiter(max_rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(max_rps).allow_burst(NonZeroU32::MIN))
}
