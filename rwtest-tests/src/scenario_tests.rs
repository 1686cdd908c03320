//! Controller scenarios on the mock bench

use rstest::rstest;
use tokio_test::{assert_err, assert_ok};

use rwtest_core::hal::mock::{MockClock, MockEdge, MockRadio, MockRadioOp};
use rwtest_core::test_utils::bench::{bench, bench_with_outcome, poll_until_idle, pulse, run_trial, TestBench};
use rwtest_core::test_utils::text::{log_listing, params_listing, register_dump};
use rwtest_core::*;

fn bench_with(params: &[(&str, &str)]) -> TestBench {
    let mut b = bench();
    for (name, value) in params {
        b.set_param(name, value).unwrap();
    }
    b
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(7)]
fn all_trials_succeed(#[case] count: u32) {
    let mut b = bench_with(&[("RxCount", count.to_string().as_str()), ("RxWindow", "200ms")]);
    assert_ok!(b.start_rx_window());

    for _ in 0..count {
        assert_eq!(b.state(), TestState::RxWindowRunning);
        b.clock().advance(Duration::from_millis(50));
        run_trial(&mut b, RadioEvent::RxDone(RxInfo::default()));
    }

    assert_eq!(b.state(), TestState::Idle);
    assert_eq!(b.pulse_count(), count);
    assert_eq!(b.success_count(), count);
    assert_eq!(b.trials_remaining(), 0);
}

#[rstest]
#[case::received(RadioEvent::RxDone(RxInfo { rssi: -101, snr: -3, len: 9 }), 4)]
#[case::timed_out(RadioEvent::RxTimeout, 0)]
fn radio_outcome_decides_success(#[case] outcome: RadioEvent, #[case] expected: u32) {
    let mut b = bench_with_outcome(outcome);
    b.set_param("RxCount", "4").unwrap();
    b.set_param("RxWindow", "20ms").unwrap();
    assert_ok!(b.start_rx_window());

    for _ in 0..4 {
        assert!(pulse(&mut b));
        b.poll();
        b.clock().advance(Duration::from_millis(100));
    }

    assert_eq!(b.state(), TestState::Idle);
    assert_eq!(b.pulse_count(), 4);
    assert_eq!(b.success_count(), expected);
}

#[rstest]
#[case::none(ClockErrorModel::None, 1_000_000, 8)]
#[case::shift(ClockErrorModel::Shift, 999_000, 8)]
#[case::widen(ClockErrorModel::Widen, 999_000, 10)]
fn clock_error_placement(#[case] policy: ClockErrorModel, #[case] start_us: u64, #[case] syms: u16) {
    let mut b = TestController::with_policy(MockClock::new(), MockEdge::new(), MockRadio::new(), policy);
    b.set_param("ClockError", "1000").unwrap();
    assert_ok!(b.start_rx_window());
    pulse(&mut b);

    assert_eq!(
        b.radio_mut().op(),
        MockRadioOp::ScheduledRx { start: Instant::from_micros(start_us), syms }
    );
}

/// Opens a fixed lead before the nominal start with a fixed size
struct FixedLead(Duration);

impl WindowPolicy for FixedLead {
    fn place(&self, req: &WindowRequest) -> Option<ScheduledReceive> {
        let start = req.edge.checked_add(req.window)?.checked_sub(self.0)?;
        Some(ScheduledReceive { start, syms: 16, timeout: req.symbol_time * 16 })
    }
}

#[test]
fn custom_window_policy() {
    let mut b = TestController::with_policy(
        MockClock::new(),
        MockEdge::new(),
        MockRadio::new(),
        FixedLead(Duration::from_millis(5)),
    );
    b.set_param("RxWindow", "40ms").unwrap();
    assert_ok!(b.start_rx_window());
    let now = b.clock().now();
    assert!(b.edge_mut().trigger(now));
    b.poll();

    assert_eq!(
        b.radio_mut().op(),
        MockRadioOp::ScheduledRx { start: Instant::from_millis(35), syms: 16 }
    );
}

#[rstest]
fn second_start_rejected(
    #[values(TestEvent::StartTx, TestEvent::StartRx, TestEvent::StartRxWindow)] running: TestEvent,
    #[values(TestEvent::StartTx, TestEvent::StartRx, TestEvent::StartRxWindow)] second: TestEvent,
) {
    let mut b = bench();
    assert_ok!(b.send_event(running));
    let state = b.state();
    assert!(state.is_busy());

    assert_eq!(b.send_event(second), Err(TestError::Busy));
    assert_eq!(b.state(), state);
    assert_eq!(b.pulse_count(), 0);

    assert_ok!(b.send_event(TestEvent::Stop));
    assert_eq!(b.state(), TestState::Idle);
}

#[rstest]
#[case::unknown("RxSpeed", "1", ParamError::UnknownName)]
#[case::malformed("RxSyms", "eight", ParamError::Malformed)]
#[case::too_small("RxSyms", "0", ParamError::OutOfRange)]
#[case::too_large("Sf", "13", ParamError::OutOfRange)]
#[case::negative_unsigned("RxCount", "-1", ParamError::Malformed)]
fn bad_parameters_rejected(#[case] name: &str, #[case] value: &str, #[case] expected: ParamError) {
    let mut b = bench();
    let before = b.params().clone();
    let err = assert_err!(b.set_param(name, value));
    assert_eq!(err, expected);
    assert_eq!(TestError::from(err), TestError::InvalidParameter(expected));
    assert_eq!(b.params(), &before);
}

#[test]
fn zero_count_finishes_without_trials() {
    let mut b = bench_with(&[("RxCount", "0")]);
    assert_ok!(b.start_rx_window());
    assert_eq!(b.state(), TestState::Idle);
    assert_eq!(b.radio_mut().schedule_count, 0);

    let log = log_listing(b.log()).unwrap();
    assert!(log.contains("state Idle -> RxWindowRunning"));
    assert!(log.contains("state RxWindowRunning -> Idle"));
}

#[test]
fn silent_radio_times_out_every_trial() {
    let mut b = bench_with(&[("RxCount", "2"), ("RxWindow", "30ms")]);
    assert_ok!(b.start_rx_window());

    assert!(pulse(&mut b));
    poll_until_idle(&mut b, Duration::from_millis(10), 20);
    assert_eq!(b.state(), TestState::RxWindowRunning);
    assert_eq!(b.trials_remaining(), 1);

    assert!(pulse(&mut b));
    let polls = poll_until_idle(&mut b, Duration::from_millis(10), 20);
    assert!(polls < 20);
    assert_eq!(b.pulse_count(), 2);
    assert_eq!(b.success_count(), 0);
    assert_eq!(b.radio_mut().cancel_count, 2);
}

#[test]
fn edges_during_receive_are_not_counted() {
    let mut b = bench_with(&[("RxCount", "2")]);
    assert_ok!(b.start_rx_window());
    assert!(pulse(&mut b));

    // Detector is disarmed until the trial resolves
    let now = b.clock().now();
    assert!(!b.edge_mut().trigger(now));
    b.poll();
    assert_eq!(b.pulse_count(), 1);
}

#[test]
fn log_records_a_trial() {
    let mut b = bench_with(&[("RxCount", "1"), ("RxWindow", "10ms")]);
    assert_ok!(b.start_rx_window());
    b.clock().advance(Duration::from_millis(1));
    run_trial(&mut b, RadioEvent::RxDone(RxInfo::default()));

    let log = log_listing(b.log()).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(
        lines,
        [
            "           0 state Idle -> RxWindowRunning",
            "        1000 edge #1",
            "        1000 rx scheduled at 11000 for 8 syms",
            "       11000 trial success, 0 left",
            "       11000 state RxWindowRunning -> Idle",
        ]
    );

    let dump = register_dump(b.log()).unwrap();
    assert!(dump.starts_with("registers at 11000:\n00: 00 81 1a 0b"));
}

#[test]
fn parameter_listing_follows_table_order() {
    let mut b = bench();
    b.set_param("rxwindow", "250us").unwrap();
    let listing = params_listing(b.params()).unwrap();
    let names: Vec<&str> = listing.lines().filter_map(|l| l.split(':').next()).collect();
    let expected: Vec<&str> = PARAMS.iter().map(|p| p.name).collect();
    assert_eq!(names, expected);
    assert!(listing.contains("RxWindow: 250us\n"));
}

#[test]
fn tx_test_counts_sent_frames() {
    let mut b = TestController::new(MockClock::new(), MockEdge::new(), MockRadio::with_auto_tx());
    b.set_param("TxInterval", "100ms").unwrap();
    assert_ok!(b.start_tx());

    for _ in 0..10 {
        b.poll();
        b.poll();
        b.clock().advance(Duration::from_millis(100));
    }
    b.stop();

    assert_eq!(b.success_count(), 10);
    assert_eq!(b.radio_mut().tx_count, 10);
    assert_eq!(&b.radio_mut().last_frame[..3], b"RWT");
    assert_eq!(b.state(), TestState::Idle);
}

#[test]
fn default_params_match_store() {
    assert_eq!(default_params(), ParamStore::new());
    assert!(!VERSION.is_empty());
}
