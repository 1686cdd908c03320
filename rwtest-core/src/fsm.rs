//! Test state machine: transition table and per-session bookkeeping

use crate::hal::Instant;
use crate::params::{RxWindowConfig, TxConfig};
use crate::types::{ScheduledReceive, TestError, TestEvent, TestState, TrialOutcome};

impl TestState {
    /// Transition table for caller events.
    ///
    /// Starts are only legal from Idle; Stop is legal everywhere and
    /// always lands in Idle.
    pub const fn on_event(self, event: TestEvent) -> Result<TestState, TestError> {
        match (self, event) {
            (_, TestEvent::Stop) => Ok(TestState::Idle),
            (TestState::Idle, TestEvent::StartTx) => Ok(TestState::TxRunning),
            (TestState::Idle, TestEvent::StartRx) => Ok(TestState::RxRunning),
            (TestState::Idle, TestEvent::StartRxWindow) => Ok(TestState::RxWindowRunning),
            (TestState::TxRunning | TestState::RxRunning | TestState::RxWindowRunning, _) => {
                Err(TestError::Busy)
            }
        }
    }
}

/// Progress of the transmit test
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TxStep {
    /// Waiting until the next frame is due
    Pause { until: Instant },
    /// Frame handed to the radio
    InFlight { seq: u32, deadline: Instant },
}

/// Progress of one receive-window trial
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WindowStep {
    /// Edge detector armed
    AwaitEdge,
    /// Receive scheduled, waiting for the radio to resolve it
    AwaitRx { rx: ScheduledReceive, deadline: Instant },
}

/// What the running test is doing, with the data each state needs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Phase {
    Idle,
    Tx { config: TxConfig, next_seq: u32, step: TxStep },
    Rx,
    RxWindow { config: RxWindowConfig, step: WindowStep },
}

impl Phase {
    pub const fn state(&self) -> TestState {
        match self {
            Phase::Idle => TestState::Idle,
            Phase::Tx { .. } => TestState::TxRunning,
            Phase::Rx => TestState::RxRunning,
            Phase::RxWindow { .. } => TestState::RxWindowRunning,
        }
    }
}

/// One in-progress or idle test with its statistics
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TestSession {
    phase: Phase,
    trials_remaining: i32,
    pulse_count: u32,
    success_count: u32,
}

impl TestSession {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            trials_remaining: 0,
            pulse_count: 0,
            success_count: 0,
        }
    }

    pub const fn state(&self) -> TestState {
        self.phase.state()
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub const fn pulse_count(&self) -> u32 {
        self.pulse_count
    }

    pub const fn success_count(&self) -> u32 {
        self.success_count
    }

    pub const fn trials_remaining(&self) -> i32 {
        self.trials_remaining
    }

    /// Begin a new test; counters start from zero
    pub fn begin(&mut self, phase: Phase, trials: i32) {
        self.phase = phase;
        self.trials_remaining = trials;
        self.pulse_count = 0;
        self.success_count = 0;
    }

    /// Back to Idle; counters stay readable
    pub fn end(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn count_pulse(&mut self) -> u32 {
        self.pulse_count = self.pulse_count.saturating_add(1);
        self.pulse_count
    }

    pub fn count_success(&mut self) {
        self.success_count = self.success_count.saturating_add(1);
    }

    /// Account for a resolved trial. Returns true when no trials remain.
    pub fn resolve_trial(&mut self, outcome: TrialOutcome) -> bool {
        if outcome.is_success() {
            self.count_success();
        }
        self.trials_remaining = (self.trials_remaining - 1).max(0);
        self.trials_remaining == 0
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [TestState; 4] = [
        TestState::Idle,
        TestState::TxRunning,
        TestState::RxRunning,
        TestState::RxWindowRunning,
    ];

    #[test]
    fn test_starts_only_from_idle() {
        assert_eq!(TestState::Idle.on_event(TestEvent::StartTx), Ok(TestState::TxRunning));
        assert_eq!(TestState::Idle.on_event(TestEvent::StartRx), Ok(TestState::RxRunning));
        assert_eq!(
            TestState::Idle.on_event(TestEvent::StartRxWindow),
            Ok(TestState::RxWindowRunning)
        );

        for state in ALL_STATES.iter().filter(|s| s.is_busy()) {
            for event in [TestEvent::StartTx, TestEvent::StartRx, TestEvent::StartRxWindow] {
                assert_eq!(state.on_event(event), Err(TestError::Busy));
            }
        }
    }

    #[test]
    fn test_stop_always_reaches_idle() {
        for state in ALL_STATES {
            assert_eq!(state.on_event(TestEvent::Stop), Ok(TestState::Idle));
        }
    }

    #[test]
    fn test_session_counts_and_resets() {
        let mut session = TestSession::new();
        session.begin(Phase::Rx, 2);
        assert_eq!(session.count_pulse(), 1);
        assert!(!session.resolve_trial(TrialOutcome::Success));
        assert!(session.resolve_trial(TrialOutcome::Timeout));
        assert_eq!(session.trials_remaining(), 0);
        assert_eq!(session.pulse_count(), 1);
        assert_eq!(session.success_count(), 1);

        session.end();
        assert_eq!(session.state(), TestState::Idle);
        assert_eq!(session.success_count(), 1);

        session.begin(Phase::Rx, 0);
        assert_eq!(session.pulse_count(), 0);
        assert_eq!(session.success_count(), 0);
    }
}
