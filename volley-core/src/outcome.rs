use crate::NO_RESPONSE_STATUS;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Transport-level failures. Recorded as failed checks, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkError {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The connection could not be established. DNS failures land here as well.
    Connect,
    /// Any other failure while sending the request or reading the response.
    Request,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkError::Timeout => "timeout",
            NetworkError::Connect => "connect",
            NetworkError::Request => "request",
        };
        f.write_str(name)
    }
}

/// The result of a single request issued by a virtual user.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub status_code: u16,
    pub latency: Duration,
    pub check_passed: bool,
    pub error: Option<NetworkError>,
}

impl RequestOutcome {
    pub fn response(status_code: u16, latency: Duration, expected_status: u16) -> Self {
        Self {
            status_code,
            latency,
            check_passed: status_code == expected_status,
            error: None,
        }
    }

    pub fn network_error(error: NetworkError, latency: Duration) -> Self {
        Self {
            status_code: NO_RESPONSE_STATUS,
            latency,
            check_passed: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_follows_expected_status() {
        let ok = RequestOutcome::response(200, Duration::from_millis(3), 200);
        assert!(ok.check_passed);

        let server_error = RequestOutcome::response(500, Duration::from_millis(3), 200);
        assert!(!server_error.check_passed);

        let created = RequestOutcome::response(201, Duration::from_millis(3), 201);
        assert!(created.check_passed);
    }

    #[test]
    fn network_errors_never_pass() {
        let outcome = RequestOutcome::network_error(NetworkError::Timeout, Duration::from_secs(1));
        assert!(!outcome.check_passed);
        assert_eq!(outcome.status_code, NO_RESPONSE_STATUS);
        assert_eq!(outcome.error, Some(NetworkError::Timeout));
    }
}
