#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// RISC-V runtime
use riscv_rt as _;

// Panic handler
use panic_halt as _;

use core::cell::RefCell;
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;
use static_cell::StaticCell;

use rwtest_core::*;
use rwtest_firmware::*;

static CONTROLLER: StaticCell<SharedController> = StaticCell::new();

/// Main firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    #[cfg(feature = "defmt")]
    defmt::info!("rwtest {} starting", VERSION);

    board::init();

    let mut controller = TestController::new(SystemClock, ExtiEdge::new(&SYNC_EDGE), BenchRadio::new(true));
    for (name, value) in BOOT_PARAMS {
        if let Err(_err) = controller.set_param(name, value) {
            #[cfg(feature = "defmt")]
            defmt::warn!("boot parameter {} rejected: {}", name, _err);
        }
    }

    match controller.start_rx_window() {
        Ok(()) => {
            #[cfg(feature = "defmt")]
            defmt::info!("Rx window test running");
        }
        Err(_err) => {
            #[cfg(feature = "defmt")]
            defmt::error!("Rx window test failed to start: {}", _err);
        }
    }

    let controller = CONTROLLER.init(Mutex::new(RefCell::new(controller)));
    spawner.must_spawn(service_task(controller));

    // Main supervision loop
    loop {
        embassy_time::Timer::after(Duration::from_secs(1)).await;
        let (_state, _pulses, _successes) = controller.lock(|c| {
            let c = c.borrow();
            (c.state(), c.pulse_count(), c.success_count())
        });
        #[cfg(feature = "defmt")]
        defmt::info!("{}: pulses={} success={}", _state, _pulses, _successes);
    }
}
