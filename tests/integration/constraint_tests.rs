//! Prohibited combinations and prohibited relays, including violations
//! triggered by panel changes and by the forced clear itself.

use super::mock_hw::{bench, bench_with, ids, relays};

use relaybench::adapters::sim::PortWrite;
use relaybench::app::events::BenchEvent;
use relaybench::config::BenchConfig;
use relaybench::{Error, ProhibitedState, RelayId};

#[test]
fn enabling_the_last_member_clears_the_bank() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([1u8, 2]).unwrap();
    bench.relays().enable([1u8, 5], 0).unwrap();

    let err = bench.relays().enable([2u8], 0).unwrap_err();

    assert_eq!(err, Error::ProhibitedCombination(ids(&[1, 2])));
    assert!(err.is_violation());
    assert!(bench.enabled().is_empty(), "relay 5 is cleared too");
    assert_eq!(bench.sink().violations(), vec![&err]);
}

#[test]
fn enabling_a_whole_combination_in_one_call_is_caught() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([3u8, 4, 5]).unwrap();

    let err = bench.relays().enable([3u8, 4, 5, 6], 0).unwrap_err();

    assert_eq!(err, Error::ProhibitedCombination(ids(&[3, 4, 5])));
    assert!(bench.enabled().is_empty());
    // The corrective clear is written to every valid relay.
    assert_eq!(
        bench.port().writes().last(),
        Some(&PortWrite::RelaysOff(ids(&(1..=18).collect::<Vec<_>>())))
    );
}

#[test]
fn partial_combination_is_allowed() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([1u8, 2, 3]).unwrap();

    bench.relays().enable([1u8, 2], 0).unwrap();

    assert_eq!(bench.enabled(), &relays(&[1, 2]));
}

#[test]
fn set_swaps_members_without_a_violation() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([1u8, 2]).unwrap();
    bench.relays().enable([1u8], 0).unwrap();

    bench.relays().set([2u8], 0).unwrap();

    assert_eq!(bench.enabled(), &relays(&[2]));
    assert!(bench.sink().violations().is_empty());
}

#[test]
fn operation_delay_is_skipped_on_violation() {
    let (mut bench, clock) = bench();
    bench.relays().add_prohibited_combination([1u8, 2]).unwrap();

    assert!(bench.relays().enable([1u8, 2], 1000).is_err());
    assert_eq!(relaybench::app::ports::Clock::now_ms(&clock), 0);
}

#[test]
fn panel_operation_is_enforced_on_poll() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([7u8, 8]).unwrap();

    bench.port_mut().panel_relay(7u8, true);
    bench.port_mut().panel_relay(8u8, true);
    let err = bench.poll().unwrap_err();

    assert_eq!(err, Error::ProhibitedCombination(ids(&[7, 8])));
    assert!(bench.enabled().is_empty());
    assert_eq!(bench.port().relay(7u8), Some(false));
}

#[test]
fn registration_is_not_retroactive() {
    let (mut bench, _clock) = bench();
    bench.relays().enable([1u8, 2], 0).unwrap();

    bench.relays().add_prohibited_combination([1u8, 2]).unwrap();
    assert_eq!(bench.enabled(), &relays(&[1, 2]));

    // The next enable of a member fires.
    bench.relays().disable([2u8], 0).unwrap();
    assert!(bench.relays().enable([2u8], 0).is_err());
}

#[test]
fn overlapping_combinations_report_the_first_registered() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([1u8, 2]).unwrap();
    bench.relays().add_prohibited_combination([2u8, 3]).unwrap();
    bench.relays().enable([1u8, 3], 0).unwrap();

    let err = bench.relays().enable([2u8], 0).unwrap_err();

    assert_eq!(err, Error::ProhibitedCombination(ids(&[1, 2])));
    assert_eq!(bench.sink().violations().len(), 2, "both combinations fired");
    assert_eq!(
        bench
            .port()
            .writes()
            .iter()
            .filter(|w| matches!(w, PortWrite::RelaysOff(_)))
            .count(),
        1,
        "one clear for both"
    );
    assert!(bench.enabled().is_empty());
}

#[test]
fn combination_with_unknown_relay_is_rejected() {
    let (mut bench, _clock) = bench();
    assert_eq!(
        bench.relays().add_prohibited_combination([1u8, 30]),
        Err(Error::InvalidRelay(vec![RelayId(30)]))
    );
    assert!(matches!(
        bench.relays().add_prohibited_combination(Vec::<u8>::new()),
        Err(Error::Config(_))
    ));
}

#[test]
fn prohibited_relay_is_turned_back_off() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_relay(18u8).unwrap();

    let err = bench.relays().enable([17u8, 18], 0).unwrap_err();

    assert_eq!(err, Error::ProhibitedState(ProhibitedState::Relay(RelayId(18))));
    assert_eq!(bench.enabled(), &relays(&[17]), "only the prohibited relay drops");
    assert_eq!(
        bench.port().writes().last(),
        Some(&PortWrite::RelaysOff(ids(&[18])))
    );
}

#[test]
fn forced_clear_notifies_the_other_relays_observers() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_combination([1u8, 2]).unwrap();
    bench.relays().add_timeout(3u8, 5_000, false).unwrap();
    bench.relays().enable([3u8, 1], 0).unwrap();
    assert!(bench.is_timeout_armed(3u8));

    assert!(bench.relays().enable([2u8], 0).is_err());

    assert!(!bench.is_timeout_armed(3u8), "clear disarmed relay 3");
}

#[test]
fn constraints_from_config_are_registered() {
    let mut config = BenchConfig::default();
    config.constraints.prohibited_combinations = vec![ids(&[4, 5])];
    config.constraints.prohibited_relays = ids(&[9]);
    let (mut bench, _clock) = bench_with(&config);

    assert!(bench.relays().enable([4u8, 5], 0).is_err());
    assert!(bench.relays().enable([9u8], 0).is_err());
    assert!(matches!(
        bench.sink().events.last(),
        Some(BenchEvent::RelaysChanged { .. })
    ));
}

#[test]
fn fault_history_keeps_violations_in_order() {
    let (mut bench, _clock) = bench();
    bench.relays().add_prohibited_relay(1u8).unwrap();
    bench.relays().add_prohibited_relay(2u8).unwrap();

    let _ = bench.relays().enable([1u8], 0);
    let _ = bench.relays().enable([2u8], 0);

    let faults: Vec<_> = bench.faults().cloned().collect();
    assert_eq!(
        faults,
        vec![
            Error::ProhibitedState(ProhibitedState::Relay(RelayId(1))),
            Error::ProhibitedState(ProhibitedState::Relay(RelayId(2))),
        ]
    );
}
