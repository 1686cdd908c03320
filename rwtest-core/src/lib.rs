#![cfg_attr(not(feature = "std"), no_std)]

//! # RwTest Core
//!
//! Firmware test controller for LoRa receive-window timing.
//! Runs transmit, continuous receive and sync-pulse triggered receive
//! window tests against abstract clock, edge input and radio traits.

pub mod types;
pub mod fsm;
pub mod controller;
pub mod hal;
pub mod edge;
pub mod params;
pub mod window;
pub mod log;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use fsm::*;
pub use controller::*;
pub use hal::{*, Instant, Duration};
pub use edge::EdgeLatch;
pub use params::{ParamError, ParamId, ParamStore, ParamValue, RxWindowConfig, TxConfig, PARAMS};
pub use window::{ClockErrorModel, ClockErrorPpm, WindowPolicy, WindowRequest, MAX_RX_SYMS};
pub use log::{EventLog, LogEntry, LogEvent, RegisterSnapshot, LOG_DEPTH};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parameter store with bench defaults: 1 s window, 8 symbols,
/// 10 trials on input line 0, SF7 at 125 kHz
pub fn default_params() -> ParamStore {
    ParamStore::new()
}
