// Bench session walkthrough on mock hardware

use rwtest_core::test_utils::bench::{bench, run_trial};
use rwtest_core::test_utils::text::{log_listing, params_listing, register_dump};
use rwtest_core::*;

fn main() {
    println!("🧪 RwTest bench session (rwtest-core {})", VERSION);

    let mut b = bench();
    for (name, value) in [("RxCount", "4"), ("RxWindow", "500ms"), ("ClockError", "40")] {
        if let Err(err) = b.set_param(name, value) {
            println!("  ⚠️ {} = {}: {}", name, value, err);
        }
    }
    print!("{}", params_listing(b.params()).unwrap_or_default());

    if let Err(err) = b.start_rx_window() {
        println!("❌ start failed: {}", err);
        return;
    }

    // Every other trial hears a frame
    for trial in 0..4 {
        b.clock().advance(Duration::from_secs(1));
        let event = if trial % 2 == 0 {
            RadioEvent::RxDone(RxInfo { rssi: -88, snr: 6, len: 12 })
        } else {
            RadioEvent::RxTimeout
        };
        run_trial(&mut b, event);
    }

    println!();
    print!("{}", log_listing(b.log()).unwrap_or_default());
    println!();
    print!("{}", register_dump(b.log()).unwrap_or_default());
    println!();
    println!(
        "✅ {}: {} pulses, {} successes",
        b.state().name(),
        b.pulse_count(),
        b.success_count()
    );
}
