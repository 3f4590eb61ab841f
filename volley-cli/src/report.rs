use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use volley_core::{FailurePolicy, RunStatistics};

/// JSON form of the end-of-run summary.
#[derive(Serialize)]
pub struct Summary<'a> {
    #[serde(flatten)]
    pub run: &'a RunStatistics,
    pub requests_per_second: f64,
    pub failure_policy: FailurePolicy,
    pub policy_violated: bool,
}

impl<'a> Summary<'a> {
    pub fn new(run: &'a RunStatistics, failure_policy: FailurePolicy) -> Self {
        Self {
            run,
            requests_per_second: run.requests_per_second(),
            failure_policy,
            policy_violated: failure_policy.is_violated(&run.stats),
        }
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
