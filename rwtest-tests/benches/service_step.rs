use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rwtest_core::test_utils::bench::{bench, bench_with_outcome, pulse};
use rwtest_core::*;

fn bench_idle_poll(c: &mut Criterion) {
    let mut b = bench();
    c.bench_function("poll_idle", |bencher| bencher.iter(|| black_box(b.poll())));
}

fn bench_waiting_for_edge(c: &mut Criterion) {
    let mut b = bench();
    b.start_rx_window().unwrap();
    c.bench_function("poll_await_edge", |bencher| bencher.iter(|| black_box(b.poll())));
}

fn bench_full_trial(c: &mut Criterion) {
    let mut b = bench_with_outcome(RadioEvent::RxDone(RxInfo::default()));
    b.set_param("RxCount", "1000000").unwrap();
    b.set_param("RxWindow", "10ms").unwrap();
    b.start_rx_window().unwrap();

    c.bench_function("edge_to_resolved_trial", |bencher| {
        bencher.iter(|| {
            b.clock().advance(Duration::from_millis(20));
            pulse(&mut b);
            black_box(b.poll())
        })
    });
}

fn bench_window_placement(c: &mut Criterion) {
    let req = WindowRequest {
        edge: Instant::from_secs(100),
        window: Duration::from_millis(1_000),
        rx_syms: 8,
        clock_error: ClockErrorPpm(50),
        symbol_time: Duration::from_micros(1_024),
    };
    c.bench_function("widen_place", |bencher| {
        bencher.iter(|| black_box(ClockErrorModel::Widen.place(black_box(&req))))
    });
}

criterion_group!(
    benches,
    bench_idle_poll,
    bench_waiting_for_edge,
    bench_full_trial,
    bench_window_placement
);
criterion_main!(benches);
