//! Time and timestamp helpers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// UTC timestamp used for `activity_start`, cooldown stamps, events, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Time elapsed from `since` to `now`, clamped to zero when `since` lies in
/// the future.
#[must_use]
pub fn elapsed(since: Timestamp, now: Timestamp) -> Duration {
    (now - since).to_std().unwrap_or_default()
}
