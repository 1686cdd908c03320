//! Monotonic clock on tokio time, so paused-time tests drive the controller

use rwtest_core::{Instant, MonotonicClock};

/// Microseconds since the clock was created, on tokio's (possibly paused) clock
#[derive(Copy, Clone, Debug)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for TokioClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.origin.elapsed().as_micros() as u64)
    }
}
