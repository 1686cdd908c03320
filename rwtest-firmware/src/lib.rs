#![no_std]

//! Firmware library: board support and embassy tasks

pub use embassy_executor::Spawner;
pub use embassy_time::Duration;
pub use static_cell::StaticCell;

pub use rwtest_core::*;

pub use crate::board::{BenchRadio, ExtiEdge, SYNC_EDGE};
pub use crate::tasks::*;

pub mod board;

// Time driver for embassy
mod time_driver;

/// Parameters applied at boot, before the first test starts
pub const BOOT_PARAMS: &[(&str, &str)] = &[
    ("RxDigIn", "0"),
    ("RxWindow", "1000ms"),
    ("RxSyms", "8"),
    ("ClockError", "50"),
    ("RxCount", "100"),
];

pub mod tasks {
    use core::cell::RefCell;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::blocking_mutex::Mutex;
    use embassy_time::{Duration, Timer};
    use rwtest_core::{SystemClock, TestController, TestState};
    use crate::board::{BenchRadio, ExtiEdge};

    /// Controller wired to the board
    pub type Controller = TestController<SystemClock, ExtiEdge, BenchRadio>;

    /// Controller shared between the service task and the main loop
    pub type SharedController = Mutex<CriticalSectionRawMutex, RefCell<Controller>>;

    /// Interval between service steps
    pub const SERVICE_PERIOD: Duration = Duration::from_millis(1);

    /// Drive the controller's service step
    #[embassy_executor::task]
    pub async fn service_task(controller: &'static SharedController) {
        #[cfg(feature = "defmt")]
        defmt::info!("Service task started");

        let mut last = TestState::Idle;
        loop {
            let state = controller.lock(|c| c.borrow_mut().poll());
            if state != last {
                #[cfg(feature = "defmt")]
                defmt::info!("state: {}", state);
                last = state;
            }
            Timer::after(SERVICE_PERIOD).await;
        }
    }
}
