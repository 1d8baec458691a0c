//! Time sources for debounce deadlines and credential ages.

use std::fmt::Debug;
use std::time::Instant;

/// Supplies the two notions of "now" the controller needs.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant used for debounce deadlines.
    fn instant(&self) -> Instant;
    /// Wall-clock Unix seconds used for credential ages.
    fn epoch_seconds(&self) -> i64;
}

/// Clock backed by the Tokio timer (which follows paused test time) and the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn instant(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn epoch_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
