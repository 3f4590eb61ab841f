use crate::driver::DriverState;
use std::sync::PoisonError;
use thiserror::Error;
use volley_core::ConfigError;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Result collector mutex is poisoned.")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for CollectorError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Result collector failure: {0}")]
    Collector(#[from] CollectorError),

    #[error("Virtual user {id} terminated abnormally: {source}")]
    Join {
        id: usize,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("Invalid driver transition from {from} to {to}")]
    InvalidTransition { from: DriverState, to: DriverState },
}

impl HarnessError {
    /// Configuration errors are raised before any request is sent.
    pub fn is_config(&self) -> bool {
        matches!(self, HarnessError::Config(_))
    }
}
