//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured bench events to the `log`
//! facade.  The binary routes them to stderr through `env_logger`.

use log::{error, info, warn};

use crate::app::events::BenchEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`BenchEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &BenchEvent) {
        match event {
            BenchEvent::Initialized { relays } => {
                info!("START | relays={} | all off", relays);
            }
            BenchEvent::Degraded => {
                warn!("START | DAQ unreachable, running degraded");
            }
            BenchEvent::RelaysChanged { enabled } => {
                info!(
                    "RELAYS | enabled={:?}",
                    enabled.iter().map(|r| r.0).collect::<Vec<_>>()
                );
            }
            BenchEvent::PowerSet(v) => {
                info!("POWER | {}", v);
            }
            BenchEvent::AuxSet(on) => {
                info!("AUX | {}", if *on { "on" } else { "off" });
            }
            BenchEvent::TimeoutExpired {
                relay,
                timeout_ms,
                fatal,
            } => {
                warn!(
                    "TIMEOUT | relay={} after {}ms | fatal={}",
                    relay, timeout_ms, fatal
                );
            }
            BenchEvent::Violation(e) => {
                error!("VIOLATION | {}", e);
            }
        }
    }
}
