//! Monotonic time sources.
//!
//! The scheduler never calls `Instant::now()` directly; it asks an injected
//! [`Clock`]. Production uses [`SystemClock`], tests drive a [`ManualClock`]
//! so budgets and liveness windows can be crossed without sleeping.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock monotonic time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Starts at the instant it was created; [`ManualClock::elapsed`] reports
/// how far it has been advanced, which keeps test timelines readable as
/// "t = 30s" rather than raw instants.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Jump to `at` past the origin. Never moves backwards.
    pub fn set(&self, at: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        if at > *offset {
            *offset = at;
        }
    }

    /// Time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
