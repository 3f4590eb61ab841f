//! A flat virtual-user HTTP load-testing harness.
//!
//! A [`Scenario`] launches a fixed number of virtual users at once. Each one repeatedly issues
//! an HTTP GET against the target, checks the response status, and sleeps before its next
//! iteration. Results are tallied by a shared [`ResultCollector`](collector::ResultCollector)
//! and returned as [`RunStatistics`] once every virtual user has drained.
//!
//! # Example
//! ```no_run
//! use volley::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HarnessError> {
//!     let stats = Scenario::new("http://0.0.0.0:8090/books/")
//!         .virtual_users(250)
//!         .duration(Duration::from_secs(30))
//!         .sleep(Duration::from_secs(1))
//!         .await?;
//!
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```
pub mod collector;
pub mod driver;
pub mod error;
mod runner;
pub mod scenario;

pub use error::{CollectorError, HarnessError};
pub use scenario::{run_scenario, Scenario};

pub mod prelude {
    pub use crate::driver::{ConcurrencyDriver, DriverState};
    pub use crate::error::HarnessError;
    pub use crate::scenario::{run_scenario, ConfigurableScenario, Scenario};

    pub use volley_core::{FailurePolicy, RunStatistics, ScenarioConfig};
}
