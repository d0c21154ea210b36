//! Fuzz target: step list parsing
//!
//! Feeds arbitrary text to the command parser and replays whatever parses.
//! Must never panic.
//!
//! cargo fuzz run fuzz_command_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaybench::Bench;
use relaybench::adapters::log_sink::LogEventSink;
use relaybench::adapters::sim::SimulatedDaq;
use relaybench::adapters::time::ManualClock;
use relaybench::app::commands::BenchCommand;
use relaybench::config::BenchConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(steps) = serde_json::from_slice::<Vec<BenchCommand>>(data) else {
        return;
    };
    let config = BenchConfig::default();
    let port = SimulatedDaq::new(config.relays.iter().copied());
    let Ok(mut bench) = Bench::new(&config, port, ManualClock::new(), LogEventSink::new()) else {
        return;
    };
    for step in steps.iter().take(64) {
        let _ = bench.handle_command(step);
    }
});
