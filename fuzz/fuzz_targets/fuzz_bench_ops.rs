//! Fuzz target: relay and power operations
//!
//! Decodes the input into a sequence of bench operations and panel changes
//! and checks after each one that the tracked partition matches the
//! simulated lines and that no prohibited combination stays enabled.
//!
//! cargo fuzz run fuzz_bench_ops

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaybench::adapters::log_sink::LogEventSink;
use relaybench::adapters::sim::SimulatedDaq;
use relaybench::adapters::time::ManualClock;
use relaybench::config::BenchConfig;
use relaybench::{Bench, RelayId, Voltage};

fuzz_target!(|data: &[u8]| {
    let mut config = BenchConfig::default();
    config.constraints.prohibited_combinations = vec![vec![RelayId(1), RelayId(2)]];
    config.constraints.prohibited_voltages = vec![Voltage(220)];
    let port = SimulatedDaq::new(config.relays.iter().copied());
    let Ok(mut bench) = Bench::new(&config, port, ManualClock::new(), LogEventSink::new()) else {
        return;
    };
    let _ = bench.relays().add_timeout(3u8, 50, data.len() % 2 == 0);

    for chunk in data.chunks(3) {
        let [op, a, b] = match *chunk {
            [op, a, b] => [op, a, b],
            _ => break,
        };
        // Ids up to 31 so invalid relays are exercised too.
        let ids = [a % 32, b % 32];
        let _ = match op % 8 {
            0 => bench.relays().enable(ids, 0),
            1 => bench.relays().disable(ids, 0),
            2 => bench.relays().set(ids, 0),
            3 => bench.relays().clear(0),
            4 => bench.power().set(Voltage(u16::from(a)), 0),
            5 => bench.delay(u64::from(b)),
            6 => {
                bench.port_mut().panel_relay(a % 32, b & 1 == 1);
                bench.poll()
            }
            _ => {
                bench.port_mut().panel_power(a % 16);
                bench.poll()
            }
        };

        let enabled = bench.enabled();
        assert!(enabled.is_disjoint(bench.disabled()));
        assert_eq!(enabled.len() + bench.disabled().len(), bench.valid_relays().len());
        for &r in bench.valid_relays() {
            assert_eq!(bench.port().relay(r), Some(enabled.contains(&r)));
        }
        assert!(!(enabled.contains(&RelayId(1)) && enabled.contains(&RelayId(2))));
        assert_ne!(bench.voltage(), Some(Voltage(220)));
    }
});
