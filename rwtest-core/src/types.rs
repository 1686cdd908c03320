//! Core data types for the receive-window test controller

use crate::hal::{Duration, HalError, Instant};
use crate::params::ParamError;

/// Test controller states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestState {
    /// No test running
    Idle,
    /// Repeated test frame transmission
    TxRunning,
    /// Continuous receive, counting frames
    RxRunning,
    /// Sync-pulse triggered receive window trials
    RxWindowRunning,
}

impl TestState {
    /// Returns true if a test occupies the controller
    pub const fn is_busy(&self) -> bool {
        !matches!(self, TestState::Idle)
    }

    /// Short name used in log output
    pub const fn name(&self) -> &'static str {
        match self {
            TestState::Idle => "Idle",
            TestState::TxRunning => "TxRunning",
            TestState::RxRunning => "RxRunning",
            TestState::RxWindowRunning => "RxWindowRunning",
        }
    }
}

/// Events a caller may post to the controller
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestEvent {
    StartTx,
    StartRx,
    StartRxWindow,
    Stop,
}

impl TestEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            TestEvent::StartTx => "StartTx",
            TestEvent::StartRx => "StartRx",
            TestEvent::StartRxWindow => "StartRxWindow",
            TestEvent::Stop => "Stop",
        }
    }
}

/// Caller-visible failures
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestError {
    /// A test is already running; stop it first
    Busy,
    /// Unknown parameter name or value outside its domain
    InvalidParameter(ParamError),
    /// Clock, edge or radio hardware failed
    Hardware(HalError),
}

impl From<ParamError> for TestError {
    fn from(err: ParamError) -> Self {
        TestError::InvalidParameter(err)
    }
}

impl From<HalError> for TestError {
    fn from(err: HalError) -> Self {
        TestError::Hardware(err)
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for TestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TestError::Busy => write!(f, "busy"),
            TestError::InvalidParameter(err) => write!(f, "invalid parameter: {}", err),
            TestError::Hardware(err) => write!(f, "hardware fault: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TestError {}

/// How a single receive-window trial ended
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrialOutcome {
    /// Valid signal detected inside the window
    Success,
    /// Window elapsed without a signal
    Timeout,
    /// Edge processed too late to schedule the window
    Late,
}

impl TrialOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, TrialOutcome::Success)
    }
}

/// Metadata reported with a received frame
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxInfo {
    pub rssi: i16,
    pub snr: i8,
    pub len: u8,
}

/// Asynchronous completions reported by the radio
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// A frame was received
    RxDone(RxInfo),
    /// A receive ended without a frame
    RxTimeout,
    /// A transmission finished
    TxDone,
}

/// Modulation settings handed to the radio at test start
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioSettings {
    pub freq_hz: u32,
    pub spreading_factor: u8,
    pub bandwidth_hz: u32,
    pub tx_power_dbm: i8,
}

impl RadioSettings {
    /// LoRa symbol duration, 2^SF / BW
    pub fn symbol_time(&self) -> Duration {
        let bw = self.bandwidth_hz.max(1) as u64;
        Duration::from_micros((1u64 << self.spreading_factor) * 1_000_000 / bw)
    }
}

/// One-shot receive instruction for a single trial
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ScheduledReceive {
    /// Absolute start of the receive window
    pub start: Instant,
    /// Window size in symbols
    pub syms: u16,
    /// Window size converted to time
    pub timeout: Duration,
}

impl ScheduledReceive {
    /// Latest time the radio can still legitimately report
    pub fn end(&self) -> Option<Instant> {
        self.start.checked_add(self.timeout)
    }
}
