use std::time::Duration;

use serde::Serialize;

/// Default time to wait on a lock held by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Common options used when opening a database for administrative commands.
#[derive(Clone, Debug, Serialize)]
pub struct AdminOpenOptions {
    /// How long to wait for a lock held by another process before failing.
    #[serde(with = "duration_ms")]
    pub busy_timeout: Duration,
}

impl Default for AdminOpenOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
