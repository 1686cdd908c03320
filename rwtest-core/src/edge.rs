//! Interrupt-fed sync edge latch

use portable_atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use crate::hal::{EdgeSource, HalError, Instant};

const NO_EDGE: u64 = u64::MAX;

/// Atomic rising-edge capture shared between an EXTI handler and the
/// controller. Safe for use in interrupt contexts.
///
/// The handler calls [`EdgeLatch::on_rising_edge`] with the time it read
/// on entry; only the first edge after arming is kept.
pub struct EdgeLatch {
    armed: AtomicBool,
    line: AtomicU8,
    captured_us: AtomicU64,
}

impl EdgeLatch {
    /// Create a disarmed latch
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            line: AtomicU8::new(0),
            captured_us: AtomicU64::new(NO_EDGE),
        }
    }

    /// Record an edge (called from interrupt handler).
    /// Returns true if the edge was latched.
    pub fn on_rising_edge(&self, at: Instant) -> bool {
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }
        self.captured_us
            .compare_exchange(NO_EDGE, at.as_micros(), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Input line the latch is armed for
    pub fn line(&self) -> u8 {
        self.line.load(Ordering::Relaxed)
    }

    fn take(&self) -> Option<Instant> {
        if !self.armed.load(Ordering::Acquire) {
            return None;
        }
        let us = self.captured_us.swap(NO_EDGE, Ordering::AcqRel);
        if us == NO_EDGE {
            return None;
        }
        self.armed.store(false, Ordering::Release);
        Some(Instant::from_micros(us))
    }
}

impl Default for EdgeLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeSource for &EdgeLatch {
    type Error = HalError;

    fn arm(&mut self, line: u8) -> Result<(), Self::Error> {
        self.line.store(line, Ordering::Relaxed);
        self.captured_us.store(NO_EDGE, Ordering::Release);
        self.armed.store(true, Ordering::Release);
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), Self::Error> {
        self.armed.store(false, Ordering::Release);
        self.captured_us.store(NO_EDGE, Ordering::Release);
        Ok(())
    }

    fn poll_edge(&mut self) -> Result<Option<Instant>, Self::Error> {
        Ok(self.take())
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}
