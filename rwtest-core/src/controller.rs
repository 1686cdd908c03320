//! Test controller: owns the session, parameters, log and hardware

use heapless::Vec;
use crate::fsm::{Phase, TestSession, TxStep, WindowStep};
use crate::hal::{Duration, EdgeSource, HalError, Instant, MonotonicClock, RadioScheduler};
use crate::log::{EventLog, LogEvent, LOG_DEPTH, REGISTER_COUNT};
use crate::params::{ParamError, ParamStore, RxWindowConfig, TxConfig};
use crate::types::{RadioEvent, TestError, TestEvent, TestState, TrialOutcome};
use crate::window::{ClockErrorModel, WindowPolicy, WindowRequest};

/// Grace period after a window closes before the controller gives up on
/// the radio reporting it
pub const RESOLVE_MARGIN: Duration = Duration::from_millis(50);

/// Longest a test frame may take to go out
pub const TX_TIMEOUT: Duration = Duration::from_secs(4);

/// Test frame prefix
pub const TX_MAGIC: &[u8; 3] = b"RWT";

/// Runs one test at a time against the clock, sync edge input and radio.
///
/// Events are accepted or rejected synchronously by [`send_event`];
/// the test itself advances only inside [`poll`], which the surrounding
/// main loop calls periodically. Nothing here blocks.
///
/// [`send_event`]: TestController::send_event
/// [`poll`]: TestController::poll
pub struct TestController<C, E, R, P = ClockErrorModel> {
    clock: C,
    edge: E,
    radio: R,
    policy: P,
    params: ParamStore,
    session: TestSession,
    log: EventLog<LOG_DEPTH>,
}

impl<C, E, R> TestController<C, E, R, ClockErrorModel>
where
    C: MonotonicClock,
    E: EdgeSource,
    R: RadioScheduler,
{
    /// Create an idle controller with default parameters and window policy
    pub fn new(clock: C, edge: E, radio: R) -> Self {
        Self::with_policy(clock, edge, radio, ClockErrorModel::default())
    }
}

impl<C, E, R, P> TestController<C, E, R, P>
where
    C: MonotonicClock,
    E: EdgeSource,
    R: RadioScheduler,
    P: WindowPolicy,
{
    pub fn with_policy(clock: C, edge: E, radio: R, policy: P) -> Self {
        Self {
            clock,
            edge,
            radio,
            policy,
            params: ParamStore::new(),
            session: TestSession::new(),
            log: EventLog::new(),
        }
    }

    pub fn state(&self) -> TestState {
        self.session.state()
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    /// Edges seen in the current or last Rx-window test
    pub fn pulse_count(&self) -> u32 {
        self.session.pulse_count()
    }

    /// Successful receives (or frames sent / received for Tx / Rx tests)
    pub fn success_count(&self) -> u32 {
        self.session.success_count()
    }

    pub fn trials_remaining(&self) -> i32 {
        self.session.trials_remaining()
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Parameters are snapshotted at test start, so edits never reach a
    /// running test
    pub fn set_param(&mut self, name: &str, text: &str) -> Result<(), ParamError> {
        self.params.set(name, text)
    }

    pub fn log(&self) -> &EventLog<LOG_DEPTH> {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn edge_mut(&mut self) -> &mut E {
        &mut self.edge
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn start_tx(&mut self) -> Result<(), TestError> {
        self.send_event(TestEvent::StartTx)
    }

    pub fn start_rx(&mut self) -> Result<(), TestError> {
        self.send_event(TestEvent::StartRx)
    }

    pub fn start_rx_window(&mut self) -> Result<(), TestError> {
        self.send_event(TestEvent::StartRxWindow)
    }

    /// Stop whatever is running. Always succeeds; a no-op when idle.
    pub fn stop(&mut self) {
        if self.state().is_busy() {
            let now = self.clock.now();
            self.teardown(now);
            self.enter_idle(now);
        }
    }

    /// Post a caller event.
    ///
    /// A start while another test runs is rejected with
    /// [`TestError::Busy`] and changes nothing. A hardware failure while
    /// starting leaves the controller idle.
    pub fn send_event(&mut self, event: TestEvent) -> Result<(), TestError> {
        let now = self.clock.now();
        let current = self.state();
        let next = match current.on_event(event) {
            Ok(next) => next,
            Err(err) => {
                self.log.record(now, LogEvent::Rejected { event, state: current });
                #[cfg(feature = "defmt")]
                defmt::warn!("{} rejected: busy in {}", event, current);
                return Err(err);
            }
        };

        let started = match next {
            TestState::Idle => {
                self.stop();
                return Ok(());
            }
            TestState::TxRunning => self.begin_tx(now),
            TestState::RxRunning => self.begin_rx(now),
            TestState::RxWindowRunning => self.begin_rx_window(now),
        };

        started.map_err(|err| {
            self.fault(now, err);
            TestError::Hardware(err)
        })
    }

    /// Periodic service step. Advances the running test by at most one
    /// step and returns the resulting state.
    pub fn poll(&mut self) -> TestState {
        let now = self.clock.now();
        let result = match self.session.phase() {
            Phase::Idle => Ok(()),
            Phase::Tx { config, next_seq, step } => self.service_tx(now, config, next_seq, step),
            Phase::Rx => self.service_rx(now),
            Phase::RxWindow { config, step } => self.service_window(now, config, step),
        };
        if let Err(err) = result {
            self.fault(now, err);
        }
        self.state()
    }

    fn begin_tx(&mut self, now: Instant) -> Result<(), HalError> {
        let config = self.params.tx_config();
        self.enter(now, Phase::Tx { config, next_seq: 0, step: TxStep::Pause { until: now } }, 0);
        self.radio.configure(&config.radio).map_err(Into::into)
    }

    fn begin_rx(&mut self, now: Instant) -> Result<(), HalError> {
        let settings = self.params.radio_settings();
        self.enter(now, Phase::Rx, 0);
        self.radio.configure(&settings).map_err(Into::into)?;
        self.radio.start_rx().map_err(Into::into)
    }

    fn begin_rx_window(&mut self, now: Instant) -> Result<(), HalError> {
        let config = self.params.rx_window_config();
        let trials = config.count.min(i32::MAX as u32) as i32;
        self.enter(now, Phase::RxWindow { config, step: WindowStep::AwaitEdge }, trials);

        if trials == 0 {
            self.enter_idle(now);
            return Ok(());
        }
        self.radio.configure(&config.radio).map_err(Into::into)?;
        self.edge.arm(config.dig_in).map_err(Into::into)
    }

    fn service_tx(
        &mut self,
        now: Instant,
        config: TxConfig,
        seq: u32,
        step: TxStep,
    ) -> Result<(), HalError> {
        match step {
            TxStep::Pause { until } => {
                if now < until {
                    return Ok(());
                }
                let mut frame: Vec<u8, 8> = Vec::new();
                frame.extend_from_slice(TX_MAGIC).map_err(|_| HalError::InvalidConfig)?;
                frame.extend_from_slice(&seq.to_le_bytes()).map_err(|_| HalError::InvalidConfig)?;
                self.radio.start_tx(&frame).map_err(Into::into)?;
                self.log.record(now, LogEvent::TxStarted { seq });

                let deadline = now.checked_add(TX_TIMEOUT).ok_or(HalError::TimingError)?;
                let step = TxStep::InFlight { seq, deadline };
                self.session.set_phase(Phase::Tx { config, next_seq: seq.wrapping_add(1), step });
            }
            TxStep::InFlight { seq: sent, deadline } => {
                let done = match self.radio.poll().map_err(Into::into)? {
                    Some(RadioEvent::TxDone) => {
                        self.session.count_success();
                        self.log.record(now, LogEvent::TxDone { seq: sent });
                        true
                    }
                    _ if now >= deadline => {
                        self.radio.cancel().map_err(Into::into)?;
                        self.log.record(now, LogEvent::TxTimeout { seq: sent });
                        true
                    }
                    _ => false,
                };
                if done {
                    let until = now.checked_add(config.interval).ok_or(HalError::TimingError)?;
                    let step = TxStep::Pause { until };
                    self.session.set_phase(Phase::Tx { config, next_seq: seq, step });
                }
            }
        }
        Ok(())
    }

    fn service_rx(&mut self, now: Instant) -> Result<(), HalError> {
        match self.radio.poll().map_err(Into::into)? {
            Some(RadioEvent::RxDone(info)) => {
                self.session.count_success();
                self.log.record(now, LogEvent::RxPacket(info));
                #[cfg(feature = "defmt")]
                defmt::debug!("rx frame: {}", info);
                self.radio.start_rx().map_err(Into::into)
            }
            Some(RadioEvent::RxTimeout) => self.radio.start_rx().map_err(Into::into),
            Some(RadioEvent::TxDone) | None => Ok(()),
        }
    }

    fn service_window(
        &mut self,
        now: Instant,
        config: RxWindowConfig,
        step: WindowStep,
    ) -> Result<(), HalError> {
        match step {
            WindowStep::AwaitEdge => {
                let Some(edge) = self.edge.poll_edge().map_err(Into::into)? else {
                    return Ok(());
                };
                let pulse = self.session.count_pulse();
                self.log.record(edge, LogEvent::EdgeCaptured { pulse });

                let request = WindowRequest {
                    edge,
                    window: config.window,
                    rx_syms: config.rx_syms,
                    clock_error: config.clock_error,
                    symbol_time: config.radio.symbol_time(),
                };
                let placed = self.policy.place(&request).filter(|rx| rx.start > now);
                let Some(rx) = placed else {
                    self.log.record(now, LogEvent::LateEdge { edge });
                    #[cfg(feature = "defmt")]
                    defmt::warn!("edge {} processed too late", pulse);
                    return self.finish_trial(now, config, TrialOutcome::Late);
                };

                let deadline = rx
                    .end()
                    .and_then(|end| end.checked_add(RESOLVE_MARGIN))
                    .ok_or(HalError::TimingError)?;
                self.radio.schedule_rx(rx.start, rx.syms).map_err(Into::into)?;
                self.log.record(now, LogEvent::RxScheduled { start: rx.start, syms: rx.syms });
                self.session.set_phase(Phase::RxWindow {
                    config,
                    step: WindowStep::AwaitRx { rx, deadline },
                });
                Ok(())
            }
            WindowStep::AwaitRx { deadline, .. } => match self.radio.poll().map_err(Into::into)? {
                Some(RadioEvent::RxDone(_)) => self.finish_trial(now, config, TrialOutcome::Success),
                Some(RadioEvent::RxTimeout) => self.finish_trial(now, config, TrialOutcome::Timeout),
                Some(RadioEvent::TxDone) | None => {
                    if now >= deadline {
                        // Radio never reported; don't leave it listening
                        self.radio.cancel().map_err(Into::into)?;
                        self.finish_trial(now, config, TrialOutcome::Timeout)
                    } else {
                        Ok(())
                    }
                }
            },
        }
    }

    fn finish_trial(
        &mut self,
        now: Instant,
        config: RxWindowConfig,
        outcome: TrialOutcome,
    ) -> Result<(), HalError> {
        let done = self.session.resolve_trial(outcome);
        let remaining = self.session.trials_remaining();
        self.log.record(now, LogEvent::TrialResolved { outcome, remaining });
        #[cfg(feature = "defmt")]
        defmt::debug!("trial {}: {} left", outcome, remaining);

        let mut regs = [0u8; REGISTER_COUNT];
        let len = self.radio.read_registers(&mut regs).map_err(Into::into)?;
        self.log.record_registers(now, &regs[..len.min(REGISTER_COUNT)]);

        if done {
            self.enter_idle(now);
            return Ok(());
        }
        self.edge.arm(config.dig_in).map_err(Into::into)?;
        self.session.set_phase(Phase::RxWindow { config, step: WindowStep::AwaitEdge });
        Ok(())
    }

    fn enter(&mut self, now: Instant, phase: Phase, trials: i32) {
        let from = self.state();
        self.session.begin(phase, trials);
        self.log_transition(now, from);
    }

    fn enter_idle(&mut self, now: Instant) {
        let from = self.state();
        self.session.end();
        self.log_transition(now, from);
    }

    fn log_transition(&mut self, now: Instant, from: TestState) {
        let to = self.state();
        if from != to {
            self.log.record(now, LogEvent::StateChange { from, to });
            #[cfg(feature = "defmt")]
            defmt::info!("{} -> {}", from, to);
        }
    }

    /// Release the edge detector and radio; errors are logged, not returned
    fn teardown(&mut self, now: Instant) {
        if let Err(err) = self.edge.disarm() {
            self.log.record(now, LogEvent::Fault(err.into()));
        }
        if let Err(err) = self.radio.cancel() {
            self.log.record(now, LogEvent::Fault(err.into()));
        }
    }

    /// Fail safe to Idle without retrying
    fn fault(&mut self, now: Instant, err: HalError) {
        self.log.record(now, LogEvent::Fault(err));
        #[cfg(feature = "defmt")]
        defmt::error!("hardware fault in {}: {}", self.state(), err);
        self.teardown(now);
        self.enter_idle(now);
    }
}
