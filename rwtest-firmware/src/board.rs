//! CH32V203 board support
//!
//! 64KB Flash / 20KB RAM. The sync pulse arrives on PA0..PA4 through
//! EXTI0..EXTI4; the radio is simulated until an RF front end is fitted.

use embassy_time::{Duration, Instant};
use heapless::Vec;
use rwtest_core::edge::EdgeLatch;
use rwtest_core::log::REGISTER_COUNT;
use rwtest_core::{EdgeSource, HalError, RadioEvent, RadioScheduler, RadioSettings, RxInfo};

const RCC_BASE: usize = 0x4002_1000;
const EXTI_BASE: usize = 0x4001_0400;
const PFIC_BASE: usize = 0xE000_E000;

const RCC_APB2PCENR: usize = 0x18;
const RCC_AFIOEN: u32 = 1 << 0;
const RCC_IOPAEN: u32 = 1 << 2;

const EXTI_IMR: usize = 0x00;
const EXTI_RTSR: usize = 0x08;
const EXTI_FTSR: usize = 0x0C;
const EXTI_PR: usize = 0x14;

const PFIC_IENR1: usize = 0x100;
const PFIC_IRER1: usize = 0x180;

/// EXTI0 is interrupt 22; EXTI1..EXTI4 follow
const EXTI0_IRQ: u32 = 22;

/// Highest input line with its own EXTI interrupt
pub const MAX_SYNC_LINE: u8 = 4;

/// Latched sync edge, written from the EXTI handlers
pub static SYNC_EDGE: EdgeLatch = EdgeLatch::new();

unsafe fn modify(addr: usize, f: impl FnOnce(u32) -> u32) {
    let reg = addr as *mut u32;
    core::ptr::write_volatile(reg, f(core::ptr::read_volatile(reg)));
}

/// Clock the GPIO port and AFIO; PA0..PA4 reset to floating inputs
pub fn init() {
    unsafe {
        modify(RCC_BASE + RCC_APB2PCENR, |v| v | RCC_IOPAEN | RCC_AFIOEN);
    }
    crate::time_driver::init();

    #[cfg(feature = "defmt")]
    defmt::info!("CH32V203 board initialized");
}

fn exti_enable(line: u8, enable: bool) {
    let bit = 1u32 << line;
    unsafe {
        if enable {
            modify(EXTI_BASE + EXTI_RTSR, |v| v | bit);
            modify(EXTI_BASE + EXTI_FTSR, |v| v & !bit);
            core::ptr::write_volatile((EXTI_BASE + EXTI_PR) as *mut u32, bit);
            modify(EXTI_BASE + EXTI_IMR, |v| v | bit);
            core::ptr::write_volatile(
                (PFIC_BASE + PFIC_IENR1) as *mut u32,
                1 << (EXTI0_IRQ + line as u32),
            );
        } else {
            modify(EXTI_BASE + EXTI_IMR, |v| v & !bit);
            core::ptr::write_volatile(
                (PFIC_BASE + PFIC_IRER1) as *mut u32,
                1 << (EXTI0_IRQ + line as u32),
            );
        }
    }
}

fn on_exti(line: u8) {
    // Timestamp first; everything after is jitter
    let now = Instant::now();
    let bit = 1u32 << line;
    unsafe {
        let pr = (EXTI_BASE + EXTI_PR) as *mut u32;
        if core::ptr::read_volatile(pr) & bit == 0 {
            return;
        }
        core::ptr::write_volatile(pr, bit);
    }
    if SYNC_EDGE.line() == line {
        SYNC_EDGE.on_rising_edge(now);
    }
}

#[no_mangle]
extern "C" fn EXTI0_IRQHandler() {
    on_exti(0);
}

#[no_mangle]
extern "C" fn EXTI1_IRQHandler() {
    on_exti(1);
}

#[no_mangle]
extern "C" fn EXTI2_IRQHandler() {
    on_exti(2);
}

#[no_mangle]
extern "C" fn EXTI3_IRQHandler() {
    on_exti(3);
}

#[no_mangle]
extern "C" fn EXTI4_IRQHandler() {
    on_exti(4);
}

/// Sync input on an EXTI line, feeding [`SYNC_EDGE`]
pub struct ExtiEdge {
    latch: &'static EdgeLatch,
}

impl ExtiEdge {
    pub fn new(latch: &'static EdgeLatch) -> Self {
        Self { latch }
    }
}

impl EdgeSource for ExtiEdge {
    type Error = HalError;

    fn arm(&mut self, line: u8) -> Result<(), Self::Error> {
        if line > MAX_SYNC_LINE {
            return Err(HalError::InvalidConfig);
        }
        if self.latch.is_armed() && self.latch.line() != line {
            exti_enable(self.latch.line(), false);
        }
        let mut latch = self.latch;
        latch.arm(line)?;
        exti_enable(line, true);
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), Self::Error> {
        let mut latch = self.latch;
        latch.disarm()?;
        exti_enable(latch.line(), false);
        Ok(())
    }

    fn poll_edge(&mut self) -> Result<Option<Instant>, Self::Error> {
        let mut latch = self.latch;
        let edge = latch.poll_edge()?;
        if edge.is_some() {
            exti_enable(latch.line(), false);
        }
        Ok(edge)
    }

    fn is_armed(&self) -> bool {
        self.latch.is_armed()
    }
}

// SX1276 LoRa register addresses mirrored by the bench radio
const REG_FRF_MSB: usize = 0x06;
const REG_OP_MODE: usize = 0x01;
const REG_PA_CONFIG: usize = 0x09;
const REG_MODEM_CONFIG1: usize = 0x1D;
const REG_MODEM_CONFIG2: usize = 0x1E;
const REG_SYMB_TIMEOUT_LSB: usize = 0x1F;
const REG_PAYLOAD_LENGTH: usize = 0x22;
const REG_VERSION: usize = 0x42;

const MODE_STANDBY: u8 = 0x81;
const MODE_TX: u8 = 0x83;
const MODE_RX_CONTINUOUS: u8 = 0x85;
const MODE_RX_SINGLE: u8 = 0x86;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum BenchOp {
    Idle,
    ScheduledRx { start: Instant, end: Instant },
    ContinuousRx,
    Tx { done_at: Instant },
}

/// Radio stand-in with an SX1276-style register file.
///
/// With loopback enabled a scheduled receive succeeds as soon as its
/// window opens and hears the last transmitted frame, otherwise it times
/// out when the window closes.
/// Continuous receive never hears anything.
pub struct BenchRadio {
    op: BenchOp,
    loopback: bool,
    symbol_time: Duration,
    regs: [u8; REGISTER_COUNT],
    frame: Vec<u8, 64>,
}

impl BenchRadio {
    pub fn new(loopback: bool) -> Self {
        let mut regs = [0u8; REGISTER_COUNT];
        regs[REG_OP_MODE] = MODE_STANDBY;
        regs[REG_VERSION] = 0x12;
        Self {
            op: BenchOp::Idle,
            loopback,
            symbol_time: Duration::from_micros(1_024),
            regs,
            frame: Vec::new(),
        }
    }
}

impl RadioScheduler for BenchRadio {
    type Error = HalError;

    fn configure(&mut self, settings: &RadioSettings) -> Result<(), Self::Error> {
        if !(6..=12).contains(&settings.spreading_factor) {
            return Err(HalError::InvalidConfig);
        }
        self.symbol_time = settings.symbol_time();

        // Frf = f * 2^19 / 32 MHz
        let frf = ((settings.freq_hz as u64) << 19) / 32_000_000;
        self.regs[REG_FRF_MSB] = (frf >> 16) as u8;
        self.regs[REG_FRF_MSB + 1] = (frf >> 8) as u8;
        self.regs[REG_FRF_MSB + 2] = frf as u8;
        self.regs[REG_PA_CONFIG] = 0x80 | (settings.tx_power_dbm.clamp(2, 17) - 2) as u8;
        let bw_code: u8 = match settings.bandwidth_hz {
            0..=7_800 => 0,
            7_801..=62_500 => 6,
            62_501..=125_000 => 7,
            125_001..=250_000 => 8,
            _ => 9,
        };
        self.regs[REG_MODEM_CONFIG1] = (bw_code << 4) | 0x02;
        self.regs[REG_MODEM_CONFIG2] = (settings.spreading_factor << 4) | 0x04;
        self.regs[REG_OP_MODE] = MODE_STANDBY;
        Ok(())
    }

    fn schedule_rx(&mut self, start: Instant, syms: u16) -> Result<(), Self::Error> {
        let end = self
            .symbol_time
            .checked_mul(syms as u32)
            .and_then(|window| start.checked_add(window))
            .ok_or(HalError::TimingError)?;
        self.regs[REG_MODEM_CONFIG2] = (self.regs[REG_MODEM_CONFIG2] & 0xFC) | (syms >> 8) as u8;
        self.regs[REG_SYMB_TIMEOUT_LSB] = syms as u8;
        self.regs[REG_OP_MODE] = MODE_RX_SINGLE;
        self.op = BenchOp::ScheduledRx { start, end };
        Ok(())
    }

    fn start_rx(&mut self) -> Result<(), Self::Error> {
        self.regs[REG_OP_MODE] = MODE_RX_CONTINUOUS;
        self.op = BenchOp::ContinuousRx;
        Ok(())
    }

    fn start_tx(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.frame.clear();
        self.frame.extend_from_slice(frame).map_err(|_| HalError::InvalidConfig)?;
        self.regs[REG_PAYLOAD_LENGTH] = frame.len() as u8;
        // Preamble plus two symbols per byte is close enough for pacing
        let done_at = self
            .symbol_time
            .checked_mul(12 + 2 * frame.len() as u32)
            .and_then(|airtime| Instant::now().checked_add(airtime))
            .ok_or(HalError::TimingError)?;
        self.regs[REG_OP_MODE] = MODE_TX;
        self.op = BenchOp::Tx { done_at };
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<RadioEvent>, Self::Error> {
        let now = Instant::now();
        let event = match self.op {
            BenchOp::ScheduledRx { start, .. } if self.loopback && now >= start => {
                Some(RadioEvent::RxDone(RxInfo { rssi: -40, snr: 10, len: self.frame.len() as u8 }))
            }
            BenchOp::ScheduledRx { end, .. } if now >= end => Some(RadioEvent::RxTimeout),
            BenchOp::Tx { done_at } if now >= done_at => Some(RadioEvent::TxDone),
            _ => None,
        };
        if event.is_some() {
            self.op = BenchOp::Idle;
            self.regs[REG_OP_MODE] = MODE_STANDBY;
        }
        Ok(event)
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        self.op = BenchOp::Idle;
        self.regs[REG_OP_MODE] = MODE_STANDBY;
        Ok(())
    }

    fn read_registers(&mut self, regs: &mut [u8]) -> Result<usize, Self::Error> {
        let n = regs.len().min(self.regs.len());
        regs[..n].copy_from_slice(&self.regs[..n]);
        Ok(n)
    }
}
