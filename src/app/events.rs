//! Outbound bench events.
//!
//! The [`Bench`](super::service::Bench) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them.

use crate::error::Error;
use crate::power::Voltage;
use crate::relays::RelayId;

/// Structured events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchEvent {
    /// Start-up sweep finished; every relay and the rail are off.
    Initialized { relays: usize },

    /// The port was unreachable at start-up.  Hardware operations fail
    /// until a new bench is built.
    Degraded,

    /// A relay operation finished; carries the enabled set, ascending.
    RelaysChanged { enabled: Vec<RelayId> },

    /// The rail was commanded to a level.
    PowerSet(Voltage),

    /// The auxiliary output was commanded.
    AuxSet(bool),

    /// A countdown expired and its relay is being forced off.
    TimeoutExpired { relay: RelayId, timeout_ms: u64, fatal: bool },

    /// A constraint fired after its corrective action was applied.
    Violation(Error),
}
