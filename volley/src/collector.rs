//! Thread-safe accumulation of request outcomes.
use crate::error::CollectorError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use volley_core::{AggregateStats, LatencyHistogram, NetworkError, RequestOutcome};

#[cfg(feature = "metrics")]
const REQUESTS_METRIC: &str = "volley.requests";
#[cfg(feature = "metrics")]
const CHECKS_PASSED_METRIC: &str = "volley.checks.passed";
#[cfg(feature = "metrics")]
const CHECKS_FAILED_METRIC: &str = "volley.checks.failed";
#[cfg(feature = "metrics")]
const LATENCY_METRIC: &str = "volley.request.latency";

/// Shared sink for every virtual user's outcomes.
///
/// An outcome is folded into fixed-size tallies and then dropped. Every update and every snapshot
/// happens under one short-lived lock, so a snapshot's breakdown always adds up to its totals. The
/// pass/fail atomics mirror the locked tallies for lock-free progress reads.
pub struct ResultCollector {
    passed: AtomicU64,
    failed: AtomicU64,
    tally: Mutex<Tally>,
}

#[derive(Debug, Default)]
struct Tally {
    latency: LatencyHistogram,
    status_codes: BTreeMap<u16, u64>,
    network_errors: BTreeMap<NetworkError, u64>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self {
            passed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            tally: Mutex::new(Tally::default()),
        }
    }

    pub fn record(&self, outcome: RequestOutcome) -> Result<(), CollectorError> {
        {
            let mut tally = self.tally.lock()?;
            match outcome.error {
                Some(error) => *tally.network_errors.entry(error).or_default() += 1,
                None => *tally.status_codes.entry(outcome.status_code).or_default() += 1,
            }
            tally.latency.record(outcome.latency);

            if outcome.check_passed {
                self.passed.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        #[cfg(feature = "metrics")]
        record_metrics(&outcome);

        Ok(())
    }

    /// Lock-free running total, for progress reporting.
    pub fn total_requests(&self) -> u64 {
        self.passed.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }

    pub fn failed_checks(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Point-in-time view of everything recorded so far. Does not reset the collector.
    pub fn snapshot(&self) -> Result<AggregateStats, CollectorError> {
        let tally = self.tally.lock()?;
        let passed_checks = self.passed.load(Ordering::Relaxed);
        let failed_checks = self.failed.load(Ordering::Relaxed);

        Ok(AggregateStats {
            total_requests: passed_checks + failed_checks,
            passed_checks,
            failed_checks,
            latency: tally.latency.summary(),
            status_codes: tally.status_codes.clone(),
            network_errors: tally.network_errors.clone(),
        })
    }

    /// Poisons the tally lock the way a panicking recorder would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _tally = self.tally.lock();
                    panic!("recorder panicked");
                })
                .join()
        });
    }
}

impl Default for ResultCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    metrics::describe_counter!(REQUESTS_METRIC, "Requests issued by virtual users");
    metrics::describe_counter!(CHECKS_PASSED_METRIC, "Requests whose status check passed");
    metrics::describe_counter!(CHECKS_FAILED_METRIC, "Requests whose status check failed");
    metrics::describe_histogram!(
        LATENCY_METRIC,
        metrics::Unit::Nanoseconds,
        "Request latency"
    );
}

#[cfg(feature = "metrics")]
fn record_metrics(outcome: &RequestOutcome) {
    metrics::counter!(REQUESTS_METRIC, "status" => outcome.status_code.to_string()).increment(1);
    if outcome.check_passed {
        metrics::counter!(CHECKS_PASSED_METRIC).increment(1);
    } else {
        metrics::counter!(CHECKS_FAILED_METRIC).increment(1);
    }
    metrics::histogram!(LATENCY_METRIC).record(outcome.latency.as_nanos() as f64);
}
