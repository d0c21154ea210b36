//! Relay on-time limits.

use super::mock_hw::{bench, bench_with, relays};

use relaybench::app::events::BenchEvent;
use relaybench::app::ports::Clock;
use relaybench::config::{BenchConfig, TimeoutRule};
use relaybench::{Error, RelayId};

#[test]
fn expiry_during_delay_disables_the_relay() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(4u8, 500, false).unwrap();

    bench.relays().enable([4u8, 5], 1000).unwrap();

    assert_eq!(bench.enabled(), &relays(&[5]));
    assert_eq!(clock.now_ms(), 1000, "non-fatal expiry keeps the delay");
    assert_eq!(
        bench.sink().events.iter().find(|e| matches!(e, BenchEvent::TimeoutExpired { .. })),
        Some(&BenchEvent::TimeoutExpired {
            relay: RelayId(4),
            timeout_ms: 500,
            fatal: false
        })
    );
}

#[test]
fn fatal_expiry_ends_the_delay_with_an_error() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(9u8, 1500, true).unwrap();

    let err = bench.relays().enable([9u8], 5000).unwrap_err();

    assert_eq!(
        err,
        Error::TimeoutExceeded {
            relay: RelayId(9),
            timeout_ms: 1500
        }
    );
    assert_eq!(clock.now_ms(), 1500);
    assert!(bench.enabled().is_empty());
    assert_eq!(bench.last_fault(), Some(&err));
}

#[test]
fn disabling_in_time_cancels_the_countdown() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(4u8, 500, true).unwrap();

    bench.relays().enable([4u8], 300).unwrap();
    bench.relays().disable([4u8], 0).unwrap();
    clock.advance(1000);

    bench.poll().unwrap();
    assert_eq!(bench.sink().timeouts(), 0);
}

#[test]
fn disabling_after_the_deadline_still_reports_the_timeout() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(4u8, 1000, true).unwrap();

    bench.relays().enable([4u8], 0).unwrap();
    clock.advance(1500);

    let expected = Error::TimeoutExceeded {
        relay: RelayId(4),
        timeout_ms: 1000,
    };
    assert_eq!(bench.relays().disable([4u8], 0), Err(expected.clone()));
    assert_eq!(bench.last_fault(), Some(&expected));
    assert_eq!(bench.sink().timeouts(), 1);
    assert_eq!(bench.port().relay(4u8), Some(false));
}

#[test]
fn overdue_timeout_blocks_the_next_power_write() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(4u8, 1000, true).unwrap();

    bench.relays().enable([4u8], 0).unwrap();
    clock.advance(1200);

    assert!(matches!(
        bench.power().set(24u16, 0),
        Err(Error::TimeoutExceeded { .. })
    ));
    assert_eq!(bench.port().power_code(), 0, "rail untouched");
    assert!(bench.enabled().is_empty());
}

#[test]
fn re_enabling_restarts_the_countdown() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(4u8, 500, false).unwrap();

    bench.relays().enable([4u8], 300).unwrap();
    bench.relays().disable([4u8], 100).unwrap();
    bench.relays().enable([4u8], 0).unwrap();

    clock.advance(450);
    bench.poll().unwrap();
    assert!(bench.enabled().contains(&RelayId(4)), "old deadline is gone");

    clock.advance(50);
    bench.poll().unwrap();
    assert!(bench.enabled().is_empty());
}

#[test]
fn enabling_an_enabled_relay_keeps_the_deadline() {
    let (mut bench, clock) = bench();
    bench.relays().add_timeout(2u8, 500, false).unwrap();

    bench.relays().enable([2u8], 400).unwrap();
    bench.relays().enable([2u8], 0).unwrap();

    clock.advance(100);
    bench.poll().unwrap();
    assert!(bench.enabled().is_empty());
}

#[test]
fn registering_on_an_enabled_relay_arms_immediately() {
    let (mut bench, clock) = bench();
    bench.relays().enable([5u8], 100).unwrap();

    bench.relays().add_timeout(5u8, 200, false).unwrap();
    assert!(bench.is_timeout_armed(5u8));

    bench.delay(250).unwrap();
    assert!(bench.enabled().is_empty());
    assert_eq!(clock.now_ms(), 350);
}

#[test]
fn panel_enable_arms_the_countdown() {
    let mut config = BenchConfig::default();
    config.constraints.timeouts = vec![TimeoutRule {
        relay: RelayId(6),
        timeout_ms: 100,
        fatal: true,
    }];
    let (mut bench, clock) = bench_with(&config);

    bench.port_mut().panel_relay(6u8, true);
    bench.poll().unwrap();
    assert!(bench.is_timeout_armed(6u8));

    clock.advance(100);
    assert!(matches!(bench.poll(), Err(Error::TimeoutExceeded { .. })));
    assert_eq!(bench.port().relay(6u8), Some(false));
}

#[test]
fn countdowns_expire_in_deadline_order() {
    let (mut bench, _clock) = bench();
    bench.relays().add_timeout(1u8, 300, false).unwrap();
    bench.relays().add_timeout(2u8, 100, false).unwrap();

    bench.relays().enable([1u8, 2], 500).unwrap();

    let expired: Vec<RelayId> = bench
        .sink()
        .events
        .iter()
        .filter_map(|e| match e {
            BenchEvent::TimeoutExpired { relay, .. } => Some(*relay),
            _ => None,
        })
        .collect();
    assert_eq!(expired, vec![RelayId(2), RelayId(1)]);
}

#[test]
fn timeout_on_unknown_relay_is_rejected() {
    let (mut bench, _clock) = bench();
    assert_eq!(
        bench.relays().add_timeout(42u8, 100, false),
        Err(Error::InvalidRelay(vec![RelayId(42)]))
    );
}
