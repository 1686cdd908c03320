//! Embassy time driver on the CH32V203 64-bit SysTick
//!
//! SysTick counts up from HCLK/8. With the 8 MHz HSI that is one tick
//! per microsecond, matching `tick-hz-1_000_000`.

use core::cell::Cell;
use critical_section::Mutex;
use embassy_time_driver::{AlarmHandle, Driver};
use portable_atomic::{AtomicBool, Ordering};

const STK_BASE: usize = 0xE000_F000;
const STK_CTLR: usize = 0x00;
const STK_SR: usize = 0x04;
const STK_CNTL: usize = 0x08;
const STK_CNTH: usize = 0x0C;
const STK_CMPLR: usize = 0x10;
const STK_CMPHR: usize = 0x14;

const CTLR_STE: u32 = 1 << 0;
const CTLR_STIE: u32 = 1 << 1;

/// PFIC interrupt enable, SysTick is interrupt 12
const PFIC_IENR1: usize = 0xE000_E100;
const SYSTICK_IRQ: u32 = 12;

fn reg(offset: usize) -> *mut u32 {
    (STK_BASE + offset) as *mut u32
}

struct Alarm {
    timestamp: Cell<u64>,
    callback: Cell<Option<(fn(*mut ()), *mut ())>>,
}

// Only touched inside critical sections
unsafe impl Send for Alarm {}

/// Single-alarm driver backed by the SysTick compare register
pub struct SysTickDriver {
    alarm_taken: AtomicBool,
    alarm: Mutex<Alarm>,
}

impl SysTickDriver {
    const fn new() -> Self {
        Self {
            alarm_taken: AtomicBool::new(false),
            alarm: Mutex::new(Alarm {
                timestamp: Cell::new(u64::MAX),
                callback: Cell::new(None),
            }),
        }
    }

    fn start(&self) {
        unsafe {
            core::ptr::write_volatile(reg(STK_CTLR), 0);
            core::ptr::write_volatile(reg(STK_CNTL), 0);
            core::ptr::write_volatile(reg(STK_CNTH), 0);
            core::ptr::write_volatile(reg(STK_CMPLR), u32::MAX);
            core::ptr::write_volatile(reg(STK_CMPHR), u32::MAX);
            core::ptr::write_volatile(reg(STK_SR), 0);
            core::ptr::write_volatile(reg(STK_CTLR), CTLR_STE);

            let ienr = PFIC_IENR1 as *mut u32;
            core::ptr::write_volatile(ienr, 1 << SYSTICK_IRQ);
        }
    }

    fn set_compare(&self, timestamp: u64, enable: bool) {
        unsafe {
            core::ptr::write_volatile(reg(STK_CMPLR), timestamp as u32);
            core::ptr::write_volatile(reg(STK_CMPHR), (timestamp >> 32) as u32);
            let ctlr = core::ptr::read_volatile(reg(STK_CTLR));
            let ctlr = if enable { ctlr | CTLR_STIE } else { ctlr & !CTLR_STIE };
            core::ptr::write_volatile(reg(STK_CTLR), ctlr);
        }
    }

    fn on_interrupt(&self) {
        unsafe { core::ptr::write_volatile(reg(STK_SR), 0) };

        let fire = critical_section::with(|cs| {
            let alarm = self.alarm.borrow(cs);
            if self.now() < alarm.timestamp.get() {
                return None;
            }
            alarm.timestamp.set(u64::MAX);
            self.set_compare(u64::MAX, false);
            alarm.callback.get()
        });

        if let Some((callback, ctx)) = fire {
            callback(ctx);
        }
    }
}

impl Driver for SysTickDriver {
    fn now(&self) -> u64 {
        // High word may roll between the two reads
        loop {
            let (hi, lo, hi2) = unsafe {
                (
                    core::ptr::read_volatile(reg(STK_CNTH)),
                    core::ptr::read_volatile(reg(STK_CNTL)),
                    core::ptr::read_volatile(reg(STK_CNTH)),
                )
            };
            if hi == hi2 {
                return ((hi as u64) << 32) | lo as u64;
            }
        }
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        if self.alarm_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(AlarmHandle::new(0))
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, callback: fn(*mut ()), ctx: *mut ()) {
        critical_section::with(|cs| {
            self.alarm.borrow(cs).callback.set(Some((callback, ctx)));
        });
    }

    fn set_alarm(&self, _alarm: AlarmHandle, timestamp: u64) -> bool {
        critical_section::with(|cs| {
            let alarm = self.alarm.borrow(cs);
            alarm.timestamp.set(timestamp);
            self.set_compare(timestamp, true);

            if self.now() >= timestamp {
                alarm.timestamp.set(u64::MAX);
                self.set_compare(u64::MAX, false);
                return false;
            }
            true
        })
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: SysTickDriver = SysTickDriver::new());

/// Start the counter; call once before any timer is used
pub fn init() {
    DRIVER.start();
}

#[no_mangle]
extern "C" fn SysTick() {
    DRIVER.on_interrupt();
}

// Critical section implementation for single-core RISC-V
struct RiscvCriticalSection;
critical_section::set_impl!(RiscvCriticalSection);

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let mstatus = riscv::register::mstatus::read();
        riscv::register::mstatus::clear_mie();
        mstatus.mie() as u8
    }

    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        if was_enabled != 0 {
            riscv::register::mstatus::set_mie();
        }
    }
}
