//! Test utilities for the receive-window controller

pub mod bench {
    //! Controller wired to mock hardware

    use crate::controller::TestController;
    use crate::hal::mock::{MockClock, MockEdge, MockRadio};
    use crate::hal::{Duration, MonotonicClock};
    use crate::types::{RadioEvent, TestState};

    /// Controller over the mock clock, edge and radio
    pub type TestBench = TestController<MockClock, MockEdge, MockRadio>;

    /// Idle bench with default parameters
    pub fn bench() -> TestBench {
        TestController::new(MockClock::new(), MockEdge::new(), MockRadio::new())
    }

    /// Bench whose radio resolves every scheduled receive with `outcome`
    pub fn bench_with_outcome(outcome: RadioEvent) -> TestBench {
        TestController::new(MockClock::new(), MockEdge::new(), MockRadio::with_auto_rx(outcome))
    }

    /// Advance by `step` and poll until the controller is idle or
    /// `limit` polls have run. Returns the number of polls.
    pub fn poll_until_idle(bench: &mut TestBench, step: Duration, limit: usize) -> usize {
        for polls in 1..=limit {
            bench.clock().advance(step);
            if bench.poll() == TestState::Idle {
                return polls;
            }
        }
        limit
    }

    /// Fire a sync edge at the current time and let the controller
    /// schedule the receive. Returns false if the edge was ignored.
    pub fn pulse(bench: &mut TestBench) -> bool {
        let now = bench.clock().now();
        let latched = bench.edge_mut().trigger(now);
        bench.poll();
        latched
    }

    /// One full trial: edge, wait out the window offset, then deliver
    /// `event` from the radio
    pub fn run_trial(bench: &mut TestBench, event: RadioEvent) {
        pulse(bench);
        let offset = bench.params().rx_window_config().window;
        bench.clock().advance(offset);
        bench.radio_mut().complete(event);
        bench.poll();
    }
}

pub mod text {
    //! Capturing textual output from the parameter store and log

    use core::fmt;
    use crate::log::EventLog;
    use crate::params::ParamStore;

    /// Render the full parameter listing
    pub fn params_listing(store: &ParamStore) -> Result<String, fmt::Error> {
        let mut out = String::new();
        store.print_all(&mut out)?;
        Ok(out)
    }

    /// Render the log, oldest first
    pub fn log_listing<const N: usize>(log: &EventLog<N>) -> Result<String, fmt::Error> {
        let mut out = String::new();
        log.print_all(&mut out)?;
        Ok(out)
    }

    /// Render the register hex dump
    pub fn register_dump<const N: usize>(log: &EventLog<N>) -> Result<String, fmt::Error> {
        let mut out = String::new();
        log.print_registers(&mut out)?;
        Ok(out)
    }
}
