//! Port traits: the hexagonal boundary between the engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Bench (domain)
//! ```
//!
//! Driven adapters (DAQ outputs, clocks, event sinks, config storage)
//! implement these traits.  The [`Bench`](super::service::Bench) consumes
//! them via generics, so the engine never touches hardware directly.

use crate::config::BenchConfig;
use crate::relays::RelayId;

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain ↔ DAQ outputs)
// ───────────────────────────────────────────────────────────────

/// A value change observed on one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChange {
    /// A relay coil was energised (`on`) or released.
    Relay { relay: RelayId, on: bool },
    /// The power rail now carries `code`.
    Power { code: u8 },
    /// The auxiliary output switched.
    Aux { on: bool },
}

/// The fixture's digital outputs.
///
/// Commands are fire-and-forget; the port reports what actually changed
/// through [`next_change`](OutputPort::next_change), in the order it
/// observed the changes.  A change must be reported only when a value
/// differs from the previous one, and changes that did not originate from
/// a command (panel operation, another control path) must be reported too.
pub trait OutputPort {
    /// Energise the given relay coils as one batch.
    fn relays_on(&mut self, relays: &[RelayId]) -> Result<(), PortError>;

    /// Release the given relay coils as one batch.
    fn relays_off(&mut self, relays: &[RelayId]) -> Result<(), PortError>;

    /// Select a rail level by its (non-off) hardware code.
    fn select_power(&mut self, code: u8) -> Result<(), PortError>;

    /// De-energise the rail.
    fn power_off(&mut self) -> Result<(), PortError>;

    /// Switch the auxiliary output.
    fn set_aux(&mut self, on: bool) -> Result<(), PortError>;

    /// Current state of one relay line.
    fn read_relay(&mut self, relay: RelayId) -> Result<bool, PortError>;

    /// Current rail code.
    fn read_power(&mut self) -> Result<u8, PortError>;

    /// Current state of the auxiliary output.
    fn read_aux(&mut self) -> Result<bool, PortError>;

    /// Pop the oldest pending change notification.
    fn next_change(&mut self) -> Option<OutputChange>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: domain → time)
// ───────────────────────────────────────────────────────────────

/// Monotonic time in milliseconds plus the ability to suspend.
pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Suspend the calling flow for `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`BenchEvent`](super::events::BenchEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::BenchEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ fixture config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the fixture configuration.
///
/// Implementations MUST validate before persisting.
pub trait ConfigPort {
    /// Returns [`BenchConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<BenchConfig, ConfigError>;

    fn save(&self, config: &BenchConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`OutputPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The DAQ is not reachable.
    NotConnected,
    /// A line could not be driven.  The tag names which.
    WriteFailed(&'static str),
    /// A line could not be read back.
    ReadFailed(&'static str),
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted(String),
    /// A config field failed validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    Io(std::io::Error),
}

impl core::fmt::Display for PortError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "DAQ not connected"),
            Self::WriteFailed(what) => write!(f, "write failed: {}", what),
            Self::ReadFailed(what) => write!(f, "read failed: {}", what),
        }
    }
}

impl std::error::Error for PortError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
