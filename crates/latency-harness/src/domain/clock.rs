//! Monotonic time source for send and receive timestamps.

use latency_types::Millis;
use parking_lot::Mutex;
use std::time::Instant;

/// Source of timestamps on the issuing side.
///
/// Both ends of a round trip are stamped from the same clock, so elapsed
/// times never mix clock domains.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed epoch.
    fn now_millis(&self) -> Millis;
}

/// Wall-clock-independent clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> Millis {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Used by tests and benches.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Millis) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        *self.now.lock()
    }
}
