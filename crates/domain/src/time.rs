//! Timestamps carried by button events and ramp sessions.

use chrono::{DateTime, Utc};

/// UTC wall-clock instant.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds between two timestamps, saturating at zero when `until`
/// precedes `since` (bridges occasionally deliver skewed clocks).
#[must_use]
pub fn elapsed_ms(since: Timestamp, until: Timestamp) -> u64 {
    u64::try_from((until - since).num_milliseconds()).unwrap_or(0)
}
