//! Receive window placement under an assumed clock error
//!
//! A receiver whose clock runs fast or slow by `e` ppm reaches the nominal
//! window start up to `RxWindow * e / 1e6` early or late. The policies here
//! decide how a scheduled receive compensates for that drift.

use crate::hal::{Duration, Instant};
use crate::types::ScheduledReceive;

/// Largest symbol timeout the radio accepts
pub const MAX_RX_SYMS: u16 = 1023;

/// Clock error in parts per million
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockErrorPpm(pub u32);

impl ClockErrorPpm {
    /// Worst-case drift accumulated over `span`, rounded up
    pub fn drift_over(&self, span: Duration) -> Duration {
        let scaled = span.as_micros() as u128 * self.0 as u128;
        let us = (scaled + 999_999) / 1_000_000;
        Duration::from_micros(us.min(u64::MAX as u128) as u64)
    }
}

/// Inputs for placing one window
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct WindowRequest {
    /// Sync edge timestamp
    pub edge: Instant,
    /// Nominal offset from the edge
    pub window: Duration,
    /// Nominal window size
    pub rx_syms: u16,
    pub clock_error: ClockErrorPpm,
    pub symbol_time: Duration,
}

/// Decides where a receive window starts and how wide it is
pub trait WindowPolicy {
    /// `None` when the placement cannot be represented (time overflow)
    fn place(&self, req: &WindowRequest) -> Option<ScheduledReceive>;
}

/// Built-in clock error corrections
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockErrorModel {
    /// Ignore the clock error
    None,
    /// Open the window early by the drift, keep its size
    Shift,
    /// Open early by the drift and widen by twice the drift so the
    /// nominal start stays centred
    #[default]
    Widen,
}

impl WindowPolicy for ClockErrorModel {
    fn place(&self, req: &WindowRequest) -> Option<ScheduledReceive> {
        let nominal = req.edge.checked_add(req.window)?;
        let drift = match self {
            ClockErrorModel::None => Duration::from_micros(0),
            ClockErrorModel::Shift | ClockErrorModel::Widen => req.clock_error.drift_over(req.window),
        };

        // An edge near the epoch cannot open earlier than the epoch
        let start = nominal.checked_sub(drift).unwrap_or(req.edge);

        let syms = match self {
            ClockErrorModel::Widen => {
                let sym_us = req.symbol_time.as_micros().max(1);
                let extra = drift.as_micros().saturating_mul(2).saturating_add(sym_us - 1) / sym_us;
                (req.rx_syms as u64).saturating_add(extra).min(MAX_RX_SYMS as u64) as u16
            }
            ClockErrorModel::None | ClockErrorModel::Shift => req.rx_syms,
        };

        let timeout = req.symbol_time.checked_mul(syms as u32)?;
        Some(ScheduledReceive { start, syms, timeout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ppm: u32) -> WindowRequest {
        WindowRequest {
            edge: Instant::from_millis(10_000),
            window: Duration::from_millis(1_000),
            rx_syms: 8,
            clock_error: ClockErrorPpm(ppm),
            // SF7 / 125 kHz
            symbol_time: Duration::from_micros(1_024),
        }
    }

    #[test]
    fn test_drift_rounds_up() {
        assert_eq!(ClockErrorPpm(0).drift_over(Duration::from_secs(1)), Duration::from_micros(0));
        assert_eq!(ClockErrorPpm(100).drift_over(Duration::from_secs(1)), Duration::from_micros(100));
        assert_eq!(ClockErrorPpm(1).drift_over(Duration::from_micros(10)), Duration::from_micros(1));
    }

    #[test]
    fn test_no_correction_uses_nominal_window() {
        let placed = ClockErrorModel::None.place(&request(5_000)).unwrap();
        assert_eq!(placed.start, Instant::from_millis(11_000));
        assert_eq!(placed.syms, 8);
        assert_eq!(placed.timeout, Duration::from_micros(8 * 1_024));
    }

    #[test]
    fn test_shift_moves_start_only() {
        // 2000 ppm over 1 s = 2 ms
        let placed = ClockErrorModel::Shift.place(&request(2_000)).unwrap();
        assert_eq!(placed.start, Instant::from_micros(11_000_000 - 2_000));
        assert_eq!(placed.syms, 8);
    }

    #[test]
    fn test_widen_adds_symbols_for_both_sides() {
        let placed = ClockErrorModel::Widen.place(&request(2_000)).unwrap();
        assert_eq!(placed.start, Instant::from_micros(11_000_000 - 2_000));
        // 4000 us / 1024 us per symbol, rounded up = 4
        assert_eq!(placed.syms, 12);
        assert_eq!(placed.timeout, Duration::from_micros(12 * 1_024));
    }

    #[test]
    fn test_widen_without_error_is_nominal() {
        let placed = ClockErrorModel::Widen.place(&request(0)).unwrap();
        assert_eq!(placed, ClockErrorModel::None.place(&request(0)).unwrap());
    }

    #[test]
    fn test_widen_caps_symbol_count() {
        // 10% over 10 s is a full second of drift
        let req = WindowRequest { window: Duration::from_secs(10), ..request(100_000) };
        let placed = ClockErrorModel::Widen.place(&req).unwrap();
        assert_eq!(placed.syms, MAX_RX_SYMS);
        assert_eq!(placed.start, Instant::from_millis(19_000));
    }

    #[test]
    fn test_widen_saturates_extreme_clock_error() {
        let req = WindowRequest {
            window: Duration::from_micros(1 << 62),
            ..request(u32::MAX)
        };
        let placed = ClockErrorModel::Widen.place(&req).unwrap();
        assert_eq!(placed.syms, MAX_RX_SYMS);
        // Drift reaches past the epoch, so the window opens at the edge
        assert_eq!(placed.start, req.edge);
        assert_eq!(placed.timeout, Duration::from_micros(1_024 * MAX_RX_SYMS as u64));
    }
}
