//! Polled edge detection over embedded-hal input pins

use embedded_hal_mock::eh1::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

use rwtest_core::hal::mock::{MockClock, MockRadio};
use rwtest_core::*;

fn levels(states: &[PinState]) -> Vec<PinTransaction> {
    states.iter().map(|&s| PinTransaction::get(s)).collect()
}

#[test]
fn rising_edge_is_timestamped_at_poll() {
    let clock = MockClock::new();
    let pin = PinMock::new(&levels(&[PinState::Low, PinState::Low, PinState::High]));
    let mut edge = EmbeddedHalEdge::new(pin, &clock, 2);

    edge.arm(2).unwrap();
    clock.advance(Duration::from_micros(300));
    assert_eq!(edge.poll_edge(), Ok(None));
    clock.advance(Duration::from_micros(300));
    assert_eq!(edge.poll_edge(), Ok(Some(Instant::from_micros(600))));

    // One-shot: disarmed polls don't touch the pin
    assert!(!edge.is_armed());
    assert_eq!(edge.poll_edge(), Ok(None));

    edge.release().done();
}

#[test]
fn pin_high_at_arm_must_fall_first() {
    let clock = MockClock::new();
    let pin = PinMock::new(&levels(&[
        PinState::High,
        PinState::High,
        PinState::Low,
        PinState::High,
    ]));
    let mut edge = EmbeddedHalEdge::new(pin, &clock, 0);

    edge.arm(0).unwrap();
    assert_eq!(edge.poll_edge(), Ok(None));
    assert_eq!(edge.poll_edge(), Ok(None));
    assert!(edge.poll_edge().unwrap().is_some());

    edge.release().done();
}

#[test]
fn wrong_line_is_rejected() {
    let clock = MockClock::new();
    let pin = PinMock::new(&[]);
    let mut edge = EmbeddedHalEdge::new(pin, &clock, 1);

    assert_eq!(edge.arm(5), Err(HalError::InvalidConfig));
    assert!(!edge.is_armed());
    assert_eq!(edge.line(), 1);

    edge.release().done();
}

#[test]
fn controller_runs_trial_from_pin() {
    let clock = MockClock::new();
    let pin = PinMock::new(&levels(&[PinState::Low, PinState::Low, PinState::High]));
    let mut pin_handle = pin.clone();
    let edge = EmbeddedHalEdge::new(pin, &clock, 3);
    let radio = MockRadio::with_auto_rx(RadioEvent::RxDone(RxInfo::default()));

    let mut controller = TestController::new(&clock, edge, radio);
    controller.set_param("RxDigIn", "3").unwrap();
    controller.set_param("RxCount", "1").unwrap();
    controller.set_param("RxWindow", "50ms").unwrap();
    controller.start_rx_window().unwrap();

    clock.advance(Duration::from_millis(1));
    assert_eq!(controller.poll(), TestState::RxWindowRunning);
    clock.advance(Duration::from_millis(1));
    assert_eq!(controller.poll(), TestState::RxWindowRunning);
    assert_eq!(controller.pulse_count(), 1);

    assert_eq!(controller.poll(), TestState::Idle);
    assert_eq!(controller.success_count(), 1);

    pin_handle.done();
}

#[test]
fn controller_faults_on_wrong_input_line() {
    let clock = MockClock::new();
    let pin = PinMock::new(&[]);
    let mut pin_handle = pin.clone();
    let edge = EmbeddedHalEdge::new(pin, &clock, 0);

    let mut controller = TestController::new(&clock, edge, MockRadio::new());
    controller.set_param("RxDigIn", "7").unwrap();
    assert_eq!(
        controller.start_rx_window(),
        Err(TestError::Hardware(HalError::InvalidConfig))
    );
    assert_eq!(controller.state(), TestState::Idle);

    pin_handle.done();
}
