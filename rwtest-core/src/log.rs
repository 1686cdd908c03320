//! Event and register log

use core::fmt::{self, Write};
use heapless::HistoryBuffer;
use crate::hal::{HalError, Instant};
use crate::types::{RxInfo, TestEvent, TestState, TrialOutcome};

/// Entries kept by the controller's log
pub const LOG_DEPTH: usize = 64;

/// Register bytes kept per snapshot
pub const REGISTER_COUNT: usize = 128;

/// Things worth remembering about a test run
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LogEvent {
    StateChange { from: TestState, to: TestState },
    /// Start request refused because a test was running
    Rejected { event: TestEvent, state: TestState },
    EdgeCaptured { pulse: u32 },
    RxScheduled { start: Instant, syms: u16 },
    /// Edge processed after the window would already have opened
    LateEdge { edge: Instant },
    TrialResolved { outcome: TrialOutcome, remaining: i32 },
    TxStarted { seq: u32 },
    TxDone { seq: u32 },
    TxTimeout { seq: u32 },
    RxPacket(RxInfo),
    Fault(HalError),
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::StateChange { from, to } => write!(f, "state {} -> {}", from.name(), to.name()),
            LogEvent::Rejected { event, state } => {
                write!(f, "{} rejected: busy in {}", event.name(), state.name())
            }
            LogEvent::EdgeCaptured { pulse } => write!(f, "edge #{}", pulse),
            LogEvent::RxScheduled { start, syms } => {
                write!(f, "rx scheduled at {} for {} syms", start.as_micros(), syms)
            }
            LogEvent::LateEdge { edge } => write!(f, "late edge at {}", edge.as_micros()),
            LogEvent::TrialResolved { outcome, remaining } => {
                let what = match outcome {
                    TrialOutcome::Success => "success",
                    TrialOutcome::Timeout => "timeout",
                    TrialOutcome::Late => "late",
                };
                write!(f, "trial {}, {} left", what, remaining)
            }
            LogEvent::TxStarted { seq } => write!(f, "tx #{} started", seq),
            LogEvent::TxDone { seq } => write!(f, "tx #{} done", seq),
            LogEvent::TxTimeout { seq } => write!(f, "tx #{} timed out", seq),
            LogEvent::RxPacket(info) => {
                write!(f, "rx len={} rssi={} snr={}", info.len, info.rssi, info.snr)
            }
            LogEvent::Fault(err) => write!(f, "fault: {}", err.name()),
        }
    }
}

/// A timestamped log entry
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct LogEntry {
    pub time: Instant,
    pub event: LogEvent,
}

/// Radio registers captured after a trial
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RegisterSnapshot {
    pub time: Instant,
    len: usize,
    regs: [u8; REGISTER_COUNT],
}

impl RegisterSnapshot {
    pub fn registers(&self) -> &[u8] {
        &self.regs[..self.len]
    }
}

/// Fixed-size ring of log entries; the oldest entry is overwritten
pub struct EventLog<const N: usize> {
    entries: HistoryBuffer<LogEntry, N>,
    registers: Option<RegisterSnapshot>,
    dropped: u32,
}

impl<const N: usize> EventLog<N> {
    pub const fn new() -> Self {
        Self {
            entries: HistoryBuffer::new(),
            registers: None,
            dropped: 0,
        }
    }

    pub fn record(&mut self, time: Instant, event: LogEvent) {
        if self.entries.len() == self.entries.capacity() {
            self.dropped = self.dropped.saturating_add(1);
        }
        self.entries.write(LogEntry { time, event });
    }

    /// Replace the register snapshot; excess bytes are dropped
    pub fn record_registers(&mut self, time: Instant, regs: &[u8]) {
        let len = regs.len().min(REGISTER_COUNT);
        let mut snapshot = RegisterSnapshot { time, len, regs: [0; REGISTER_COUNT] };
        snapshot.regs[..len].copy_from_slice(&regs[..len]);
        self.registers = Some(snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Entries overwritten since the log was cleared
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.oldest_ordered()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.recent()
    }

    pub fn registers(&self) -> Option<&RegisterSnapshot> {
        self.registers.as_ref()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.registers = None;
        self.dropped = 0;
    }

    /// Write every entry, oldest first
    pub fn print_all<W: Write>(&self, out: &mut W) -> fmt::Result {
        if self.dropped > 0 {
            writeln!(out, "({} older entries dropped)", self.dropped)?;
        }
        for entry in self.entries() {
            writeln!(out, "{:>12} {}", entry.time.as_micros(), entry.event)?;
        }
        Ok(())
    }

    /// Hex dump of the latest register snapshot
    pub fn print_registers<W: Write>(&self, out: &mut W) -> fmt::Result {
        let Some(snapshot) = &self.registers else {
            return writeln!(out, "no register snapshot");
        };
        write!(out, "registers at {}:", snapshot.time.as_micros())?;
        for (addr, value) in snapshot.registers().iter().enumerate() {
            if addr % 16 == 0 {
                write!(out, "\n{:02x}:", addr)?;
            }
            write!(out, " {:02x}", value)?;
        }
        writeln!(out)
    }
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn test_log_prints_oldest_first() {
        let mut log = EventLog::<4>::new();
        log.record(Instant::from_micros(10), LogEvent::EdgeCaptured { pulse: 1 });
        log.record(Instant::from_micros(20), LogEvent::EdgeCaptured { pulse: 2 });

        let mut out: String<256> = String::new();
        log.print_all(&mut out).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("          10 edge #1"));
        assert_eq!(lines.next(), Some("          20 edge #2"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_log_overwrites_oldest() {
        let mut log = EventLog::<2>::new();
        for pulse in 1..=3 {
            log.record(Instant::from_micros(pulse as u64), LogEvent::EdgeCaptured { pulse });
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 1);
        let first = log.entries().next().unwrap();
        assert_eq!(first.event, LogEvent::EdgeCaptured { pulse: 2 });
        assert_eq!(log.last().unwrap().event, LogEvent::EdgeCaptured { pulse: 3 });

        let mut out: String<256> = String::new();
        log.print_all(&mut out).unwrap();
        assert!(out.starts_with("(1 older entries dropped)"));
    }

    #[test]
    fn test_register_dump() {
        let mut log = EventLog::<2>::new();
        let mut out: String<512> = String::new();
        log.print_registers(&mut out).unwrap();
        assert_eq!(out.as_str(), "no register snapshot\n");

        let regs: [u8; 18] = core::array::from_fn(|i| i as u8);
        log.record_registers(Instant::from_micros(5), &regs);
        out.clear();
        log.print_registers(&mut out).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("registers at 5:"));
        assert_eq!(
            lines.next(),
            Some("00: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f")
        );
        assert_eq!(lines.next(), Some("10: 10 11"));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut log = EventLog::<2>::new();
        log.record(Instant::from_micros(1), LogEvent::Fault(HalError::RadioError));
        log.record_registers(Instant::from_micros(1), &[1, 2, 3]);
        log.clear();
        assert!(log.is_empty());
        assert!(log.registers().is_none());
    }
}
