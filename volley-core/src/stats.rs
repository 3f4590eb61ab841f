use crate::NetworkError;
use metrics_util::Summary;
use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// 0.1% relative error on quantiles, at most 32KiB of buckets.
const SKETCH_ALPHA: f64 = 0.001;
const SKETCH_MAX_BUCKETS: u32 = 4_096;
const SKETCH_MIN_SECS: f64 = 1.0e-9;

/// Latency distribution of every recorded request.
#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub min: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub mean: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p50: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p95: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p99: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub max: Duration,
}

impl LatencySummary {
    pub fn from_latencies(latencies: &[Duration]) -> Self {
        let mut histogram = LatencyHistogram::new();
        for latency in latencies {
            histogram.record(*latency);
        }
        histogram.summary()
    }
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={:.2?} mean={:.2?} p50={:.2?} p90={:.2?} p95={:.2?} p99={:.2?} max={:.2?}",
            self.min, self.mean, self.p50, self.p90, self.p95, self.p99, self.max,
        )
    }
}

/// Running latency histogram.
///
/// Quantiles come from a bounded DDSketch, so memory stays flat no matter how many requests a
/// run records. Min, max and mean are exact.
#[derive(Clone)]
pub struct LatencyHistogram {
    sketch: Summary,
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            sketch: Summary::new(SKETCH_ALPHA, SKETCH_MAX_BUCKETS, SKETCH_MIN_SECS),
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.sketch.add(latency.as_secs_f64());
        self.count += 1;
        self.total = self.total.saturating_add(latency);
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Approximate heap and inline size of the sketch, in bytes.
    pub fn estimated_size(&self) -> usize {
        self.sketch.estimated_size()
    }

    pub fn summary(&self) -> LatencySummary {
        if self.is_empty() {
            return LatencySummary::default();
        }

        let quantile = |q: f64| {
            let secs = self.sketch.quantile(q).unwrap_or(0.);
            Duration::from_secs_f64(secs.max(0.)).clamp(self.min, self.max)
        };

        LatencySummary {
            min: self.min,
            mean: Duration::from_secs_f64(self.total.as_secs_f64() / self.count as f64),
            p50: quantile(0.5),
            p90: quantile(0.9),
            p95: quantile(0.95),
            p99: quantile(0.99),
            max: self.max,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("count", &self.count)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

/// Totals accumulated by the result collector.
///
/// `passed_checks + failed_checks == total_requests` holds for every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_requests: u64,
    pub passed_checks: u64,
    pub failed_checks: u64,
    pub latency: LatencySummary,
    pub status_codes: BTreeMap<u16, u64>,
    pub network_errors: BTreeMap<NetworkError, u64>,
}

impl AggregateStats {
    pub fn check_pass_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.
        } else {
            self.passed_checks as f64 / self.total_requests as f64
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.
        } else {
            self.failed_checks as f64 / self.total_requests as f64
        }
    }
}

/// Final statistics of a scenario run.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub virtual_users: usize,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    /// Iterations completed across every virtual user.
    pub iterations: u64,
    pub stats: AggregateStats,
}

impl RunStatistics {
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            self.stats.total_requests as f64 / secs
        } else {
            0.
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(
            f,
            "virtual users....: {} ({})",
            self.virtual_users,
            humantime::format_duration(round_to_millis(self.elapsed))
        )?;
        writeln!(f, "iterations.......: {}", self.iterations)?;
        writeln!(
            f,
            "requests.........: {} ({:.2}/s)",
            stats.total_requests,
            self.requests_per_second()
        )?;
        writeln!(
            f,
            "checks passed....: {} ({:.2}%)",
            stats.passed_checks,
            stats.check_pass_rate() * 100.
        )?;
        writeln!(f, "checks failed....: {}", stats.failed_checks)?;

        if !stats.status_codes.is_empty() {
            let codes: Vec<_> = stats
                .status_codes
                .iter()
                .map(|(code, count)| format!("{code}={count}"))
                .collect();
            writeln!(f, "status codes.....: {}", codes.join(" "))?;
        }

        if !stats.network_errors.is_empty() {
            let errors: Vec<_> = stats
                .network_errors
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            writeln!(f, "network errors...: {}", errors.join(" "))?;
        }

        write!(f, "latency..........: {}", stats.latency)
    }
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
