//! Start-up sweep, degraded mode and the cascade guard.

use super::mock_hw::{RecordingSink, bench_with, ids};

use relaybench::adapters::sim::{PortWrite, SimulatedDaq};
use relaybench::adapters::time::ManualClock;
use relaybench::app::events::BenchEvent;
use relaybench::app::ports::PortError;
use relaybench::config::BenchConfig;
use relaybench::{Bench, Error, RelayId, Voltage};

#[test]
fn start_up_sweeps_every_output_off() {
    let config = BenchConfig::default();
    let mut port = SimulatedDaq::new(config.relays.iter().copied());
    port.panel_relay(3u8, true);
    port.panel_power(2);
    port.panel_aux(true);

    let bench = Bench::new(&config, port, ManualClock::new(), RecordingSink::default()).unwrap();

    assert!(bench.is_connected());
    assert!(bench.enabled().is_empty());
    assert_eq!(bench.disabled().len(), 18);
    assert_eq!(bench.voltage(), Some(Voltage::OFF));
    assert!(bench.aux(), "aux is left as found");
    assert_eq!(
        bench.port().writes(),
        &[
            PortWrite::RelaysOff(ids(&(1..=18).collect::<Vec<_>>())),
            PortWrite::PowerOff,
        ]
    );
    assert_eq!(
        bench.sink().events,
        vec![BenchEvent::Initialized { relays: 18 }]
    );
}

#[test]
fn unreachable_daq_gives_a_degraded_bench() {
    let config = BenchConfig::default();
    let port = SimulatedDaq::disconnected(config.relays.iter().copied());
    let mut bench =
        Bench::new(&config, port, ManualClock::new(), RecordingSink::default()).unwrap();

    assert!(!bench.is_connected());
    assert_eq!(bench.sink().events, vec![BenchEvent::Degraded]);

    let not_connected = Err(Error::Port(PortError::NotConnected));
    assert_eq!(bench.relays().enable([1u8], 0), not_connected);
    assert_eq!(bench.relays().clear(0), not_connected);
    assert_eq!(bench.power().set(24u16, 0), not_connected);
    assert_eq!(bench.power().aux(true, 0), not_connected);
    assert_eq!(bench.poll(), not_connected);

    // Validation still comes first.
    assert_eq!(
        bench.power().set(48u16, 0),
        Err(Error::InvalidVoltage(Voltage(48)))
    );
    assert!(bench.relays().add_timeout(2u8, 100, false).is_ok());
}

#[test]
fn invalid_config_is_refused() {
    let config = BenchConfig {
        relays: vec![RelayId(1), RelayId(1)],
        ..BenchConfig::default()
    };
    let port = SimulatedDaq::new(config.relays.iter().copied());
    let res = Bench::new(&config, port, ManualClock::new(), RecordingSink::default());
    assert!(matches!(res, Err(Error::Config(_))));
}

#[test]
fn config_constraint_on_unknown_relay_is_refused() {
    let mut config = BenchConfig::default();
    config.constraints.prohibited_relays = vec![RelayId(30)];
    let port = SimulatedDaq::new(config.relays.iter().copied());
    let res = Bench::new(&config, port, ManualClock::new(), RecordingSink::default());
    assert!(matches!(res, Err(Error::InvalidRelay(_))));
}

#[test]
fn cascade_guard_forces_everything_off() {
    let config = BenchConfig {
        max_cascade: 2,
        ..BenchConfig::default()
    };
    let (mut bench, _clock) = bench_with(&config);
    bench.power().set(12u16, 0).unwrap();

    let err = bench.relays().enable([1u8, 2, 3], 0).unwrap_err();

    assert_eq!(err, Error::CascadeOverflow);
    assert!(bench.enabled().is_empty());
    assert_eq!(bench.voltage(), Some(Voltage::OFF));
    for r in 1..=3u8 {
        assert_eq!(bench.port().relay(r), Some(false));
    }
    assert_eq!(bench.last_fault(), Some(&Error::CascadeOverflow));
}
