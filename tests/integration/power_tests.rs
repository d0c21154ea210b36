//! Power rail and aux output.

use super::mock_hw::{bench, bench_with};

use relaybench::adapters::sim::PortWrite;
use relaybench::app::events::BenchEvent;
use relaybench::app::ports::Clock;
use relaybench::config::BenchConfig;
use relaybench::{Error, ProhibitedState, Voltage};

#[test]
fn set_selects_the_level_code() {
    let (mut bench, _clock) = bench();

    bench.power().set(110u16, 0).unwrap();

    assert_eq!(bench.voltage(), Some(Voltage(110)));
    assert_eq!(bench.port().power_code(), 4);
    assert_eq!(bench.port().writes(), &[PortWrite::SelectPower(4)]);
    assert_eq!(
        bench.sink().events.last(),
        Some(&BenchEvent::PowerSet(Voltage(110)))
    );
}

#[test]
fn off_goes_through_power_off() {
    let (mut bench, _clock) = bench();
    bench.power().set(24u16, 0).unwrap();
    bench.port_mut().clear_writes();

    bench.power().set(Voltage::OFF, 0).unwrap();

    assert_eq!(bench.voltage(), Some(Voltage::OFF));
    assert_eq!(bench.port().writes(), &[PortWrite::PowerOff]);
}

#[test]
fn unsupported_level_is_rejected_before_any_write() {
    let (mut bench, _clock) = bench();

    assert_eq!(
        bench.power().set(48u16, 0),
        Err(Error::InvalidVoltage(Voltage(48)))
    );
    assert!(bench.port().writes().is_empty());
    assert_eq!(bench.voltage(), Some(Voltage::OFF));
}

#[test]
fn prohibited_level_forces_the_rail_off() {
    let (mut bench, _clock) = bench();
    bench.power().add_prohibited_voltage(220u16).unwrap();

    let err = bench.power().set(220u16, 500).unwrap_err();

    assert_eq!(err, Error::ProhibitedState(ProhibitedState::Voltage(Voltage(220))));
    assert_eq!(bench.voltage(), Some(Voltage::OFF));
    assert_eq!(
        bench.port().writes(),
        &[PortWrite::SelectPower(8), PortWrite::PowerOff]
    );
    assert_eq!(bench.clock().now_ms(), 0, "delay skipped");
}

#[test]
fn other_levels_stay_allowed() {
    let (mut bench, _clock) = bench();
    bench.power().add_prohibited_voltage(220u16).unwrap();

    bench.power().set(12u16, 0).unwrap();

    assert_eq!(bench.voltage(), Some(Voltage(12)));
}

#[test]
fn prohibiting_unknown_or_off_level_fails() {
    let (mut bench, _clock) = bench();
    assert_eq!(
        bench.power().add_prohibited_voltage(5u16),
        Err(Error::InvalidVoltage(Voltage(5)))
    );
    assert!(matches!(
        bench.power().add_prohibited_voltage(Voltage::OFF),
        Err(Error::Config(_))
    ));
}

#[test]
fn panel_rail_change_is_enforced_on_poll() {
    let mut config = BenchConfig::default();
    config.constraints.prohibited_voltages = vec![Voltage(110)];
    let (mut bench, _clock) = bench_with(&config);

    bench.port_mut().panel_power(4);
    assert_eq!(
        bench.poll(),
        Err(Error::ProhibitedState(ProhibitedState::Voltage(Voltage(110))))
    );
    assert_eq!(bench.port().power_code(), 0);
}

#[test]
fn unmapped_rail_code_is_tracked_but_not_a_level() {
    let (mut bench, _clock) = bench();

    bench.port_mut().panel_power(3);
    bench.poll().unwrap();

    assert_eq!(bench.voltage(), None);
}

#[test]
fn aux_is_independent_of_the_rail() {
    let (mut bench, clock) = bench();
    bench.power().set(24u16, 0).unwrap();

    bench.power().aux(true, 40).unwrap();

    assert!(bench.aux());
    assert!(bench.port().aux());
    assert_eq!(bench.voltage(), Some(Voltage(24)));
    assert_eq!(clock.now_ms(), 40);

    bench.power().aux(false, 0).unwrap();
    assert!(!bench.aux());
}
