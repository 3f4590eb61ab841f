use std::num::NonZeroUsize;
use std::time::Duration;

/// Virtual users launched when none are configured.
pub const DEFAULT_VIRTUAL_USERS: NonZeroUsize = NonZeroUsize::MIN;

/// Per-request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The status code a response must carry for its check to pass.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Status code recorded for requests which never received a response.
pub const NO_RESPONSE_STATUS: u16 = 0;
