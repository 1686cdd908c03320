//! Hardware abstraction layer: time source, sync-edge input and radio scheduler

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    //! Microsecond time types for builds without embassy-time

    /// Mock instant type, microseconds since an arbitrary origin
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Instant(u64);

    impl Instant {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1_000)
        }

        pub const fn from_secs(s: u64) -> Self {
            Self(s * 1_000_000)
        }

        pub const fn as_micros(&self) -> u64 {
            self.0
        }

        pub const fn as_millis(&self) -> u64 {
            self.0 / 1_000
        }

        /// Saturates to zero when `other` is later
        pub fn duration_since(&self, other: Instant) -> Duration {
            Duration(self.0.saturating_sub(other.0))
        }

        pub fn saturating_duration_since(&self, other: Instant) -> Duration {
            Duration(self.0.saturating_sub(other.0))
        }

        pub fn checked_duration_since(&self, other: Instant) -> Option<Duration> {
            self.0.checked_sub(other.0).map(Duration)
        }

        pub fn checked_add(&self, d: Duration) -> Option<Instant> {
            self.0.checked_add(d.0).map(Instant)
        }

        pub fn checked_sub(&self, d: Duration) -> Option<Instant> {
            self.0.checked_sub(d.0).map(Instant)
        }
    }

    impl core::ops::Add<Duration> for Instant {
        type Output = Instant;

        fn add(self, rhs: Duration) -> Instant {
            Instant(self.0 + rhs.0)
        }
    }

    impl core::ops::Sub<Instant> for Instant {
        type Output = Duration;

        fn sub(self, rhs: Instant) -> Duration {
            Duration(self.0 - rhs.0)
        }
    }

    /// Mock duration type, microseconds
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1_000)
        }

        pub const fn from_secs(s: u64) -> Self {
            Self(s * 1_000_000)
        }

        pub const fn as_micros(&self) -> u64 {
            self.0
        }

        pub const fn as_millis(&self) -> u64 {
            self.0 / 1_000
        }

        pub fn checked_add(self, rhs: Duration) -> Option<Duration> {
            self.0.checked_add(rhs.0).map(Duration)
        }

        pub fn checked_sub(self, rhs: Duration) -> Option<Duration> {
            self.0.checked_sub(rhs.0).map(Duration)
        }

        pub fn checked_mul(self, rhs: u32) -> Option<Duration> {
            self.0.checked_mul(rhs as u64).map(Duration)
        }
    }

    impl core::ops::Add for Duration {
        type Output = Duration;

        fn add(self, rhs: Duration) -> Duration {
            Duration(self.0 + rhs.0)
        }
    }

    impl core::ops::AddAssign for Duration {
        fn add_assign(&mut self, rhs: Duration) {
            self.0 += rhs.0;
        }
    }

    impl core::ops::Div<u32> for Duration {
        type Output = Duration;

        fn div(self, rhs: u32) -> Duration {
            Duration(self.0 / rhs as u64)
        }
    }

    impl core::ops::Mul<u32> for Duration {
        type Output = Duration;

        fn mul(self, rhs: u32) -> Duration {
            Duration(self.0 * rhs as u64)
        }
    }
}

use embedded_hal::digital::InputPin;
use crate::types::{RadioEvent, RadioSettings};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Timing operation failed
    TimingError,
    /// Radio did not accept a command
    RadioError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

impl HalError {
    pub const fn name(&self) -> &'static str {
        match self {
            HalError::GpioError => "GpioError",
            HalError::TimingError => "TimingError",
            HalError::RadioError => "RadioError",
            HalError::NotInitialized => "NotInitialized",
            HalError::InvalidConfig => "InvalidConfig",
        }
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::TimingError => write!(f, "Timing operation failed"),
            HalError::RadioError => write!(f, "Radio command failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Monotonic time source
pub trait MonotonicClock {
    fn now(&self) -> Instant;
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Rising-edge detector on a digital input line.
///
/// Detection is one-shot: after `poll_edge` has reported an edge the
/// detector is disarmed until `arm` is called again. Edges that occur
/// while disarmed are discarded.
pub trait EdgeSource {
    type Error: Into<HalError>;

    /// Start watching `line` for a rising edge
    fn arm(&mut self, line: u8) -> Result<(), Self::Error>;

    /// Stop watching and drop any captured edge
    fn disarm(&mut self) -> Result<(), Self::Error>;

    /// Timestamp of the captured edge, if one arrived since `arm`
    fn poll_edge(&mut self) -> Result<Option<Instant>, Self::Error>;

    /// Returns true while waiting for an edge
    fn is_armed(&self) -> bool;
}

/// Radio operations used by the tests.
///
/// Every start operation replaces whatever the radio was doing.
/// Completions are reported through `poll`.
pub trait RadioScheduler {
    type Error: Into<HalError>;

    /// Apply modulation settings
    fn configure(&mut self, settings: &RadioSettings) -> Result<(), Self::Error>;

    /// Single receive starting at `start`, listening for `syms` symbols
    fn schedule_rx(&mut self, start: Instant, syms: u16) -> Result<(), Self::Error>;

    /// Continuous receive
    fn start_rx(&mut self) -> Result<(), Self::Error>;

    /// Transmit a frame now
    fn start_tx(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Next completion, if any
    fn poll(&mut self) -> Result<Option<RadioEvent>, Self::Error>;

    /// Abort any pending or running operation
    fn cancel(&mut self) -> Result<(), Self::Error>;

    /// Copy register contents into `regs`, returning the number written
    fn read_registers(&mut self, regs: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Clock backed by the embassy time driver
#[cfg(feature = "embassy-time")]
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

#[cfg(feature = "embassy-time")]
impl MonotonicClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Polled edge detector for embedded-hal input pins.
///
/// The rising edge is timestamped at the poll that first sees the pin
/// high, so resolution is the service interval.
pub struct EmbeddedHalEdge<P, C> {
    pin: P,
    clock: C,
    line: u8,
    armed: bool,
    last_high: bool,
}

impl<P, C> EmbeddedHalEdge<P, C>
where
    P: InputPin,
    C: MonotonicClock,
{
    /// Wrap `pin`, which is wired to input line `line`
    pub fn new(pin: P, clock: C, line: u8) -> Self {
        Self {
            pin,
            clock,
            line,
            armed: false,
            last_high: false,
        }
    }

    /// Line identifier this pin answers to
    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }

    /// Give back the pin
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P, C> EdgeSource for EmbeddedHalEdge<P, C>
where
    P: InputPin,
    C: MonotonicClock,
{
    type Error = HalError;

    fn arm(&mut self, line: u8) -> Result<(), Self::Error> {
        if line != self.line {
            return Err(HalError::InvalidConfig);
        }
        // A pin already high at arm time must go low before it counts
        self.last_high = self.pin.is_high().map_err(|_| HalError::GpioError)?;
        self.armed = true;
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), Self::Error> {
        self.armed = false;
        Ok(())
    }

    fn poll_edge(&mut self) -> Result<Option<Instant>, Self::Error> {
        if !self.armed {
            return Ok(None);
        }
        let high = self.pin.is_high().map_err(|_| HalError::GpioError)?;
        let rising = high && !self.last_high;
        self.last_high = high;
        if rising {
            self.armed = false;
            return Ok(Some(self.clock.now()));
        }
        Ok(None)
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use crate::types::RxInfo;
    use core::cell::Cell;
    use heapless::{Deque, Vec};

    /// Manually advanced clock
    #[derive(Default)]
    pub struct MockClock {
        now: Cell<u64>,
    }

    impl MockClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn starting_at(t: Instant) -> Self {
            Self { now: Cell::new(t.as_micros()) }
        }

        pub fn advance(&self, d: Duration) {
            self.now.set(self.now.get() + d.as_micros());
        }

        pub fn set(&self, t: Instant) {
            self.now.set(t.as_micros());
        }
    }

    impl MonotonicClock for MockClock {
        fn now(&self) -> Instant {
            Instant::from_micros(self.now.get())
        }
    }

    /// Edge source driven by the test
    #[derive(Default)]
    pub struct MockEdge {
        line: Option<u8>,
        pending: Option<Instant>,
        fail_next: Option<HalError>,
        pub arm_count: u32,
        pub disarm_count: u32,
    }

    impl MockEdge {
        pub fn new() -> Self {
            Self::default()
        }

        /// Simulate a rising edge; ignored unless armed
        pub fn trigger(&mut self, at: Instant) -> bool {
            if self.line.is_some() && self.pending.is_none() {
                self.pending = Some(at);
                true
            } else {
                false
            }
        }

        /// Line the detector is currently armed on
        pub fn armed_line(&self) -> Option<u8> {
            self.line
        }

        /// Make the next operation fail with `err`
        pub fn fail_next(&mut self, err: HalError) {
            self.fail_next = Some(err);
        }

        fn check_fault(&mut self) -> Result<(), HalError> {
            match self.fail_next.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl EdgeSource for MockEdge {
        type Error = HalError;

        fn arm(&mut self, line: u8) -> Result<(), Self::Error> {
            self.check_fault()?;
            self.arm_count += 1;
            self.line = Some(line);
            self.pending = None;
            Ok(())
        }

        fn disarm(&mut self) -> Result<(), Self::Error> {
            self.disarm_count += 1;
            self.line = None;
            self.pending = None;
            Ok(())
        }

        fn poll_edge(&mut self) -> Result<Option<Instant>, Self::Error> {
            self.check_fault()?;
            match self.pending.take() {
                Some(t) => {
                    self.line = None;
                    Ok(Some(t))
                }
                None => Ok(None),
            }
        }

        fn is_armed(&self) -> bool {
            self.line.is_some()
        }
    }

    /// What the mock radio is currently doing
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum MockRadioOp {
        Idle,
        ScheduledRx { start: Instant, syms: u16 },
        ContinuousRx,
        Tx { len: usize },
    }

    /// Radio that records commands and reports test-injected completions
    pub struct MockRadio {
        op: MockRadioOp,
        events: Deque<RadioEvent, 8>,
        settings: Option<RadioSettings>,
        auto_rx: Option<RadioEvent>,
        auto_tx: bool,
        fail_next: Option<HalError>,
        pub last_frame: Vec<u8, 32>,
        pub schedule_count: u32,
        pub cancel_count: u32,
        pub tx_count: u32,
        pub registers: [u8; 16],
    }

    impl Default for MockRadio {
        fn default() -> Self {
            Self {
                op: MockRadioOp::Idle,
                events: Deque::new(),
                settings: None,
                auto_rx: None,
                auto_tx: false,
                fail_next: None,
                last_frame: Vec::new(),
                schedule_count: 0,
                cancel_count: 0,
                tx_count: 0,
                registers: [
                    0x00, 0x81, 0x1a, 0x0b, 0x00, 0x52, 0xe4, 0xc0,
                    0x00, 0x4f, 0x09, 0x2b, 0x20, 0x08, 0x02, 0x0a,
                ],
            }
        }
    }

    impl MockRadio {
        pub fn new() -> Self {
            Self::default()
        }

        /// Resolve every scheduled receive with `outcome` on the next poll
        pub fn with_auto_rx(outcome: RadioEvent) -> Self {
            Self { auto_rx: Some(outcome), ..Self::default() }
        }

        /// Complete every transmission on the next poll
        pub fn with_auto_tx() -> Self {
            Self { auto_tx: true, ..Self::default() }
        }

        /// Queue a completion for the next poll
        pub fn complete(&mut self, event: RadioEvent) {
            self.events.push_back(event).ok();
        }

        /// Receive success with plausible metadata
        pub fn complete_rx(&mut self) {
            self.complete(RadioEvent::RxDone(RxInfo { rssi: -92, snr: 7, len: 12 }));
        }

        pub fn op(&self) -> MockRadioOp {
            self.op
        }

        pub fn settings(&self) -> Option<RadioSettings> {
            self.settings
        }

        /// Make the next operation fail with `err`
        pub fn fail_next(&mut self, err: HalError) {
            self.fail_next = Some(err);
        }

        fn check_fault(&mut self) -> Result<(), HalError> {
            match self.fail_next.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl RadioScheduler for MockRadio {
        type Error = HalError;

        fn configure(&mut self, settings: &RadioSettings) -> Result<(), Self::Error> {
            self.check_fault()?;
            self.settings = Some(*settings);
            Ok(())
        }

        fn schedule_rx(&mut self, start: Instant, syms: u16) -> Result<(), Self::Error> {
            self.check_fault()?;
            self.schedule_count += 1;
            self.op = MockRadioOp::ScheduledRx { start, syms };
            Ok(())
        }

        fn start_rx(&mut self) -> Result<(), Self::Error> {
            self.check_fault()?;
            self.op = MockRadioOp::ContinuousRx;
            Ok(())
        }

        fn start_tx(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
            self.check_fault()?;
            self.last_frame.clear();
            self.last_frame.extend_from_slice(frame).map_err(|_| HalError::InvalidConfig)?;
            self.tx_count += 1;
            self.op = MockRadioOp::Tx { len: frame.len() };
            Ok(())
        }

        fn poll(&mut self) -> Result<Option<RadioEvent>, Self::Error> {
            self.check_fault()?;
            if let Some(event) = self.events.pop_front() {
                self.op = MockRadioOp::Idle;
                return Ok(Some(event));
            }
            match (self.op, self.auto_rx) {
                (MockRadioOp::ScheduledRx { .. }, Some(outcome)) => {
                    self.op = MockRadioOp::Idle;
                    return Ok(Some(outcome));
                }
                _ => {}
            }
            if self.auto_tx && matches!(self.op, MockRadioOp::Tx { .. }) {
                self.op = MockRadioOp::Idle;
                return Ok(Some(RadioEvent::TxDone));
            }
            Ok(None)
        }

        fn cancel(&mut self) -> Result<(), Self::Error> {
            self.cancel_count += 1;
            self.op = MockRadioOp::Idle;
            self.events.clear();
            Ok(())
        }

        fn read_registers(&mut self, regs: &mut [u8]) -> Result<usize, Self::Error> {
            self.check_fault()?;
            let n = regs.len().min(self.registers.len());
            regs[..n].copy_from_slice(&self.registers[..n]);
            Ok(n)
        }
    }
}
