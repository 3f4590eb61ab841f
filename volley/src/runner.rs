use crate::collector::ResultCollector;
use crate::error::HarnessError;
use governor::DefaultDirectRateLimiter;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::{NetworkError, RequestOutcome, ScenarioConfig};

/// Builds the HTTP client owned by a single virtual user.
///
/// Proxies from the environment are ignored so that requests go straight to the target.
pub(crate) fn http_client(config: &ScenarioConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .http1_only()
        .no_proxy()
        .timeout(config.request_timeout())
        .build()
}

/// Broadcast flag telling every virtual user to finish its current iteration and exit.
#[derive(Clone)]
pub(crate) struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub(crate) struct VirtualUser {
    id: usize,
    client: Client,
    config: Arc<ScenarioConfig>,
    collector: Arc<ResultCollector>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    stop: StopSignal,
}

impl VirtualUser {
    pub fn new(
        id: usize,
        client: Client,
        config: Arc<ScenarioConfig>,
        collector: Arc<ResultCollector>,
        limiter: Option<Arc<DefaultDirectRateLimiter>>,
        stop: StopSignal,
    ) -> Self {
        Self {
            id,
            client,
            config,
            collector,
            limiter,
            stop,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs the request/check/sleep loop until stopped or out of iterations. Returns the number
    /// of completed iterations.
    pub async fn run(self) -> Result<u64, HarnessError> {
        let mut stop_rx = self.stop.subscribe();
        let max_iterations = self.config.iterations_per_user();
        let sleep_interval = self.config.sleep_interval();
        let mut iterations = 0;

        loop {
            if self.stop.is_triggered() {
                break;
            }

            if let Some(limiter) = &self.limiter {
                tokio::select! {
                    _ = limiter.until_ready() => {}
                    _ = stopped(&mut stop_rx) => break,
                }
            }

            let outcome = self.iteration().await;
            if let Err(err) = self.collector.record(outcome) {
                error!("Unable to record outcome, stopping all virtual users: {err}");
                self.stop.trigger();
                return Err(err.into());
            }
            iterations += 1;

            if max_iterations.is_some_and(|max| iterations >= max) {
                break;
            }

            if !sleep_interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(sleep_interval) => {}
                    _ = stopped(&mut stop_rx) => break,
                }
            }
        }

        debug!("Virtual user finished after {iterations} iterations");
        Ok(iterations)
    }

    async fn iteration(&self) -> RequestOutcome {
        let start = Instant::now();
        let res = self.request().await;
        let latency = start.elapsed();

        match res {
            Ok(status) => {
                trace!("GET {} -> {status} in {latency:?}", self.config.target_url());
                RequestOutcome::response(status, latency, self.config.expected_status())
            }
            Err(err) => {
                let kind = classify(&err);
                debug!("GET {} failed ({kind}): {err}", self.config.target_url());
                RequestOutcome::network_error(kind, latency)
            }
        }
    }

    async fn request(&self) -> Result<u16, reqwest::Error> {
        let response = self
            .client
            .get(self.config.target_url().clone())
            .send()
            .await?;
        let status = response.status().as_u16();
        // The body is part of the response; a request isn't complete until it has been read.
        response.bytes().await?;
        Ok(status)
    }
}

fn classify(err: &reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout
    } else if err.is_connect() {
        NetworkError::Connect
    } else {
        NetworkError::Request
    }
}
