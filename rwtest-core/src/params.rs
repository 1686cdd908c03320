//! Named, typed test parameters with textual get/set

use core::fmt::{self, Write};
use crate::hal::Duration;
use crate::types::RadioSettings;
use crate::window::ClockErrorPpm;

/// Parameter store failures
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamError {
    /// No parameter with that name
    UnknownName,
    /// Text does not parse in the parameter's domain
    Malformed,
    /// Parsed value outside the allowed range
    OutOfRange,
    /// Text sink refused the write
    Output,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ParamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParamError::UnknownName => write!(f, "unknown parameter"),
            ParamError::Malformed => write!(f, "malformed value"),
            ParamError::OutOfRange => write!(f, "value out of range"),
            ParamError::Output => write!(f, "output buffer full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParamError {}

/// Parameter identifiers, in table order
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamId {
    RxDigIn,
    RxWindow,
    RxSyms,
    ClockError,
    RxCount,
    Freq,
    Sf,
    Bw,
    TxPower,
    TxInterval,
}

/// Accepted values for a parameter
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParamDomain {
    Unsigned { min: u32, max: u32 },
    Signed { min: i32, max: i32 },
    /// Microsecond bounds
    Duration { min_us: u64, max_us: u64 },
}

/// A parameter value
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParamValue {
    Unsigned(u32),
    Signed(i32),
    Duration(Duration),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Unsigned(v) => write!(f, "{}", v),
            ParamValue::Signed(v) => write!(f, "{}", v),
            ParamValue::Duration(d) => {
                let us = d.as_micros();
                if us % 1_000 == 0 {
                    write!(f, "{}ms", us / 1_000)
                } else {
                    write!(f, "{}us", us)
                }
            }
        }
    }
}

/// Static description of one parameter
#[derive(Debug)]
pub struct ParamInfo {
    pub id: ParamId,
    pub name: &'static str,
    pub help: &'static str,
    pub domain: ParamDomain,
    pub default: ParamValue,
}

pub const PARAM_COUNT: usize = 10;

/// The parameter table
pub static PARAMS: [ParamInfo; PARAM_COUNT] = [
    ParamInfo {
        id: ParamId::RxDigIn,
        name: "RxDigIn",
        help: "digital input line carrying the sync pulse",
        domain: ParamDomain::Unsigned { min: 0, max: 63 },
        default: ParamValue::Unsigned(0),
    },
    ParamInfo {
        id: ParamId::RxWindow,
        name: "RxWindow",
        help: "delay from sync edge to scheduled receive (us, ms or s)",
        domain: ParamDomain::Duration { min_us: 0, max_us: 10_000_000 },
        default: ParamValue::Duration(Duration::from_millis(1_000)),
    },
    ParamInfo {
        id: ParamId::RxSyms,
        name: "RxSyms",
        help: "receive window size in symbols",
        domain: ParamDomain::Unsigned { min: 1, max: 1_023 },
        default: ParamValue::Unsigned(8),
    },
    ParamInfo {
        id: ParamId::ClockError,
        name: "ClockError",
        help: "assumed clock error in ppm",
        domain: ParamDomain::Unsigned { min: 0, max: 100_000 },
        default: ParamValue::Unsigned(0),
    },
    ParamInfo {
        id: ParamId::RxCount,
        name: "RxCount",
        help: "number of receive window trials",
        domain: ParamDomain::Unsigned { min: 0, max: 1_000_000 },
        default: ParamValue::Unsigned(10),
    },
    ParamInfo {
        id: ParamId::Freq,
        name: "Freq",
        help: "radio frequency in Hz",
        domain: ParamDomain::Unsigned { min: 137_000_000, max: 1_020_000_000 },
        default: ParamValue::Unsigned(915_000_000),
    },
    ParamInfo {
        id: ParamId::Sf,
        name: "Sf",
        help: "LoRa spreading factor",
        domain: ParamDomain::Unsigned { min: 6, max: 12 },
        default: ParamValue::Unsigned(7),
    },
    ParamInfo {
        id: ParamId::Bw,
        name: "Bw",
        help: "LoRa bandwidth in Hz",
        domain: ParamDomain::Unsigned { min: 7_800, max: 500_000 },
        default: ParamValue::Unsigned(125_000),
    },
    ParamInfo {
        id: ParamId::TxPower,
        name: "TxPower",
        help: "transmit power in dBm",
        domain: ParamDomain::Signed { min: -4, max: 20 },
        default: ParamValue::Signed(14),
    },
    ParamInfo {
        id: ParamId::TxInterval,
        name: "TxInterval",
        help: "pause between Tx test frames (us, ms or s)",
        domain: ParamDomain::Duration { min_us: 0, max_us: 60_000_000 },
        default: ParamValue::Duration(Duration::from_millis(1_000)),
    },
];

impl ParamDomain {
    /// Parse `text` and check it against the domain
    pub fn parse(&self, text: &str) -> Result<ParamValue, ParamError> {
        let text = text.trim();
        match *self {
            ParamDomain::Unsigned { min, max } => {
                let v = parse_unsigned(text)?;
                let v = u32::try_from(v).map_err(|_| ParamError::OutOfRange)?;
                if v < min || v > max {
                    return Err(ParamError::OutOfRange);
                }
                Ok(ParamValue::Unsigned(v))
            }
            ParamDomain::Signed { min, max } => {
                let (negative, digits) = match text.as_bytes().first() {
                    Some(b'-') => (true, &text[1..]),
                    Some(b'+') => (false, &text[1..]),
                    _ => (false, text),
                };
                let magnitude = parse_unsigned(digits)?;
                let v = i64::try_from(magnitude).map_err(|_| ParamError::OutOfRange)?;
                let v = if negative { -v } else { v };
                if v < min as i64 || v > max as i64 {
                    return Err(ParamError::OutOfRange);
                }
                Ok(ParamValue::Signed(v as i32))
            }
            ParamDomain::Duration { min_us, max_us } => {
                let (digits, scale) = if let Some(d) = text.strip_suffix("us") {
                    (d, 1)
                } else if let Some(d) = text.strip_suffix("ms") {
                    (d, 1_000)
                } else if let Some(d) = text.strip_suffix('s') {
                    (d, 1_000_000)
                } else {
                    (text, 1_000)
                };
                let us = parse_unsigned(digits.trim_end())?
                    .checked_mul(scale)
                    .ok_or(ParamError::OutOfRange)?;
                if us < min_us || us > max_us {
                    return Err(ParamError::OutOfRange);
                }
                Ok(ParamValue::Duration(Duration::from_micros(us)))
            }
        }
    }
}

fn parse_unsigned(text: &str) -> Result<u64, ParamError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParamError::Malformed);
    }
    text.parse::<u64>().map_err(|_| ParamError::OutOfRange)
}

/// Snapshot of everything a receive-window session needs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RxWindowConfig {
    pub dig_in: u8,
    pub window: Duration,
    pub rx_syms: u16,
    pub clock_error: ClockErrorPpm,
    pub count: u32,
    pub radio: RadioSettings,
}

/// Snapshot for the transmit test
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TxConfig {
    pub interval: Duration,
    pub radio: RadioSettings,
}

/// Parameter values, indexed by [`ParamId`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamStore {
    values: [ParamValue; PARAM_COUNT],
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore {
    /// Store holding every parameter's default
    pub fn new() -> Self {
        let mut values = [ParamValue::Unsigned(0); PARAM_COUNT];
        for (slot, info) in values.iter_mut().zip(PARAMS.iter()) {
            *slot = info.default;
        }
        Self { values }
    }

    /// Case-insensitive name lookup
    pub fn lookup(name: &str) -> Option<&'static ParamInfo> {
        PARAMS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn info(id: ParamId) -> &'static ParamInfo {
        &PARAMS[id as usize]
    }

    pub fn value(&self, id: ParamId) -> ParamValue {
        self.values[id as usize]
    }

    pub fn get(&self, name: &str) -> Result<ParamValue, ParamError> {
        let info = Self::lookup(name).ok_or(ParamError::UnknownName)?;
        Ok(self.value(info.id))
    }

    /// Write the value of `name` as text
    pub fn get_text<W: Write>(&self, name: &str, out: &mut W) -> Result<(), ParamError> {
        let value = self.get(name)?;
        write!(out, "{}", value).map_err(|_| ParamError::Output)
    }

    /// Parse and commit; on any error the store is unchanged
    pub fn set(&mut self, name: &str, text: &str) -> Result<(), ParamError> {
        let info = Self::lookup(name).ok_or(ParamError::UnknownName)?;
        let value = info.domain.parse(text)?;
        self.values[info.id as usize] = value;
        Ok(())
    }

    /// All parameters in table order
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParamInfo, ParamValue)> + '_ {
        PARAMS.iter().zip(self.values.iter().copied())
    }

    /// Write `name: value` lines for every parameter
    pub fn print_all<W: Write>(&self, out: &mut W) -> fmt::Result {
        for (info, value) in self.iter() {
            writeln!(out, "{}: {}", info.name, value)?;
        }
        Ok(())
    }

    /// Write `name: help` lines for every parameter
    pub fn print_help<W: Write>(out: &mut W) -> fmt::Result {
        for info in PARAMS.iter() {
            writeln!(out, "{}: {}", info.name, info.help)?;
        }
        Ok(())
    }

    pub fn unsigned(&self, id: ParamId) -> u32 {
        match self.value(id) {
            ParamValue::Unsigned(v) => v,
            ParamValue::Signed(v) => v.max(0) as u32,
            ParamValue::Duration(d) => d.as_micros().min(u32::MAX as u64) as u32,
        }
    }

    pub fn signed(&self, id: ParamId) -> i32 {
        match self.value(id) {
            ParamValue::Signed(v) => v,
            ParamValue::Unsigned(v) => v.min(i32::MAX as u32) as i32,
            ParamValue::Duration(d) => d.as_micros().min(i32::MAX as u64) as i32,
        }
    }

    pub fn duration(&self, id: ParamId) -> Duration {
        match self.value(id) {
            ParamValue::Duration(d) => d,
            ParamValue::Unsigned(v) => Duration::from_micros(v as u64),
            ParamValue::Signed(v) => Duration::from_micros(v.max(0) as u64),
        }
    }

    pub fn radio_settings(&self) -> RadioSettings {
        RadioSettings {
            freq_hz: self.unsigned(ParamId::Freq),
            spreading_factor: self.unsigned(ParamId::Sf) as u8,
            bandwidth_hz: self.unsigned(ParamId::Bw),
            tx_power_dbm: self.signed(ParamId::TxPower) as i8,
        }
    }

    pub fn rx_window_config(&self) -> RxWindowConfig {
        RxWindowConfig {
            dig_in: self.unsigned(ParamId::RxDigIn) as u8,
            window: self.duration(ParamId::RxWindow),
            rx_syms: self.unsigned(ParamId::RxSyms) as u16,
            clock_error: ClockErrorPpm(self.unsigned(ParamId::ClockError)),
            count: self.unsigned(ParamId::RxCount),
            radio: self.radio_settings(),
        }
    }

    pub fn tx_config(&self) -> TxConfig {
        TxConfig {
            interval: self.duration(ParamId::TxInterval),
            radio: self.radio_settings(),
        }
    }
}
