//! Wall-clock source for timestamps recorded by the core.

use roomstate_domain::time::{Timestamp, now};
use tokio::time::Instant;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Reads the system clock directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// UTC time anchored once, then advanced by the tokio monotonic clock.
///
/// Under a paused tokio runtime timestamps move with `tokio::time::advance`,
/// so elapsed-time checks agree with scheduled sleeps.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor: Timestamp,
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: now(),
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_default();
        self.anchor + elapsed
    }
}
