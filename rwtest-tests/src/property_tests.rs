//! Property tests for window placement, parameters and the controller

use proptest::prelude::*;

use rwtest_core::test_utils::bench::{bench, pulse};
use rwtest_core::*;

fn symbol_time(sf: u8, bw_hz: u32) -> Duration {
    RadioSettings { freq_hz: 868_000_000, spreading_factor: sf, bandwidth_hz: bw_hz, tx_power_dbm: 14 }
        .symbol_time()
}

proptest! {
    #[test]
    fn widened_window_covers_drift(
        edge_ms in 10_000u64..1_000_000,
        window_us in 0u64..=10_000_000,
        ppm in 0u32..=100_000,
        rx_syms in 1u16..=MAX_RX_SYMS,
        sf in 6u8..=12,
        bw in prop::sample::select(vec![62_500u32, 125_000, 250_000, 500_000]),
    ) {
        let req = WindowRequest {
            edge: Instant::from_millis(edge_ms),
            window: Duration::from_micros(window_us),
            rx_syms,
            clock_error: ClockErrorPpm(ppm),
            symbol_time: symbol_time(sf, bw),
        };
        let placed = ClockErrorModel::Widen.place(&req).unwrap();
        let nominal = req.edge + req.window;
        let drift = req.clock_error.drift_over(req.window);

        prop_assert_eq!(placed.start + drift, nominal);
        prop_assert!(placed.syms >= rx_syms);
        prop_assert!(placed.syms <= MAX_RX_SYMS);
        prop_assert_eq!(placed.timeout, req.symbol_time * placed.syms as u32);

        if placed.syms < MAX_RX_SYMS {
            // Late side: a receiver running slow still sees the whole nominal window
            let nominal_end = nominal + req.symbol_time * rx_syms as u32 + drift;
            prop_assert!(placed.start + placed.timeout >= nominal_end);
        }
    }

    #[test]
    fn shift_keeps_size(
        window_us in 0u64..=10_000_000,
        ppm in 0u32..=100_000,
        rx_syms in 1u16..=MAX_RX_SYMS,
    ) {
        let req = WindowRequest {
            edge: Instant::from_secs(20),
            window: Duration::from_micros(window_us),
            rx_syms,
            clock_error: ClockErrorPpm(ppm),
            symbol_time: symbol_time(7, 125_000),
        };
        let shifted = ClockErrorModel::Shift.place(&req).unwrap();
        let plain = ClockErrorModel::None.place(&req).unwrap();
        prop_assert_eq!(shifted.syms, plain.syms);
        prop_assert!(shifted.start <= plain.start);
    }

    #[test]
    fn failed_set_leaves_store_untouched(
        idx in 0usize..PARAMS.len(),
        text in "[-+0-9a-z]{0,12}",
    ) {
        let mut store = ParamStore::new();
        let before = store.clone();
        let name = PARAMS[idx].name;
        match store.set(name, &text) {
            Ok(()) => prop_assert_eq!(store.get(name), PARAMS[idx].domain.parse(&text)),
            Err(_) => prop_assert_eq!(store, before),
        }
    }

    #[test]
    fn counters_follow_outcomes(outcomes in prop::collection::vec(any::<bool>(), 1..20)) {
        let mut b = bench();
        b.set_param("RxCount", &outcomes.len().to_string()).unwrap();
        b.set_param("RxWindow", "5ms").unwrap();
        b.start_rx_window().unwrap();

        for &received in &outcomes {
            prop_assert!(pulse(&mut b));
            b.clock().advance(Duration::from_millis(5));
            if received {
                b.radio_mut().complete_rx();
            } else {
                b.radio_mut().complete(RadioEvent::RxTimeout);
            }
            b.poll();
            b.clock().advance(Duration::from_millis(1));
        }

        let successes = outcomes.iter().filter(|&&r| r).count() as u32;
        prop_assert_eq!(b.state(), TestState::Idle);
        prop_assert_eq!(b.pulse_count(), outcomes.len() as u32);
        prop_assert_eq!(b.success_count(), successes);
    }

    #[test]
    fn arbitrary_event_sequences_respect_busy_rule(ops in prop::collection::vec(0u8..8, 0..60)) {
        let mut b = bench();
        b.set_param("RxWindow", "3ms").unwrap();
        b.set_param("RxCount", "4").unwrap();

        for op in ops {
            let before = b.state();
            let event = match op {
                0 => Some(TestEvent::StartTx),
                1 => Some(TestEvent::StartRx),
                2 => Some(TestEvent::StartRxWindow),
                3 => Some(TestEvent::Stop),
                _ => None,
            };
            match event {
                Some(TestEvent::Stop) => {
                    prop_assert_eq!(b.send_event(TestEvent::Stop), Ok(()));
                    prop_assert_eq!(b.state(), TestState::Idle);
                }
                Some(start) => {
                    let result = b.send_event(start);
                    if before.is_busy() {
                        prop_assert_eq!(result, Err(TestError::Busy));
                        prop_assert_eq!(b.state(), before);
                    } else {
                        prop_assert_eq!(result, Ok(()));
                    }
                }
                None => match op {
                    4 => { pulse(&mut b); }
                    5 => b.radio_mut().complete_rx(),
                    6 => b.clock().advance(Duration::from_millis(2)),
                    _ => { b.poll(); }
                },
            }

            prop_assert!(b.trials_remaining() >= 0);
            prop_assert!(b.trials_remaining() <= 4);
        }
    }
}
