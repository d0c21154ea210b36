//! Unified error types for the bench engine.
//!
//! A single `Error` enum that every subsystem converts into, so callers of
//! the relay bank and the power controller handle one type.  Argument errors
//! (`InvalidRelay`, `InvalidVoltage`) are raised before any hardware write;
//! violations are raised after the corrective write has been applied.

use core::fmt;

use crate::app::ports::PortError;
use crate::power::Voltage;
use crate::relays::RelayId;

// ---------------------------------------------------------------------------
// Top-level engine error
// ---------------------------------------------------------------------------

/// Every fallible bench operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// One or more identifiers are outside the valid relay set.
    /// Carries the offending identifiers, sorted.
    InvalidRelay(Vec<RelayId>),
    /// The level is not in the voltage table.
    InvalidVoltage(Voltage),
    /// A forbidden voltage or relay was reached and has been shut off.
    ProhibitedState(ProhibitedState),
    /// Every relay of a prohibited combination was enabled; the bank has
    /// been cleared.
    ProhibitedCombination(Vec<RelayId>),
    /// A relay stayed enabled past its fatal timeout and was disabled.
    TimeoutExceeded { relay: RelayId, timeout_ms: u64 },
    /// The output port rejected a command.
    Port(PortError),
    /// Configuration or registration is invalid.
    Config(&'static str),
    /// One operation produced more notifications than the cascade limit.
    /// Every output has been forced off.
    CascadeOverflow,
}

impl Error {
    /// True for constraint violations (raised after a corrective write).
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            Self::ProhibitedState(_)
                | Self::ProhibitedCombination(_)
                | Self::TimeoutExceeded { .. }
                | Self::CascadeOverflow
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRelay(relays) => {
                write!(f, "relays [{}] are not valid", join(relays))
            }
            Self::InvalidVoltage(v) => write!(f, "invalid voltage value {v}"),
            Self::ProhibitedState(state) => write!(f, "prohibited state reached: {state}"),
            Self::ProhibitedCombination(relays) => {
                write!(f, "relays [{}] are in a prohibited combination", join(relays))
            }
            Self::TimeoutExceeded { relay, timeout_ms } => {
                write!(f, "relay {relay} disabled after exceeding its {timeout_ms}ms timeout")
            }
            Self::Port(e) => write!(f, "port: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::CascadeOverflow => write!(f, "notification cascade limit exceeded, all outputs forced off"),
        }
    }
}

impl std::error::Error for Error {}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

// ---------------------------------------------------------------------------
// Prohibited states
// ---------------------------------------------------------------------------

/// The single-output state that a ProhibitedState observer guards against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProhibitedState {
    Voltage(Voltage),
    Relay(RelayId),
}

impl fmt::Display for ProhibitedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage(v) => write!(f, "voltage {v}"),
            Self::Relay(r) => write!(f, "relay {r} enabled"),
        }
    }
}

impl From<ProhibitedState> for Error {
    fn from(state: ProhibitedState) -> Self {
        Self::ProhibitedState(state)
    }
}

fn join(relays: &[RelayId]) -> String {
    relays
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
