//! Inbound bench commands.
//!
//! A serialisable form of the caller-facing operations, so a fixture step
//! list can be stored as JSON and replayed through
//! [`Bench::handle_command`](super::service::Bench::handle_command).
//!
//! ```json
//! [
//!   { "op": "power", "volts": 24, "delay_ms": 500 },
//!   { "op": "set", "relays": [1, 4] },
//!   { "op": "wait", "ms": 1000 },
//!   { "op": "clear" }
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::power::Voltage;
use crate::relays::RelayId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BenchCommand {
    Enable {
        relays: Vec<RelayId>,
        #[serde(default)]
        delay_ms: u64,
    },
    Disable {
        relays: Vec<RelayId>,
        #[serde(default)]
        delay_ms: u64,
    },
    Set {
        relays: Vec<RelayId>,
        #[serde(default)]
        delay_ms: u64,
    },
    Clear {
        #[serde(default)]
        delay_ms: u64,
    },
    Power {
        volts: Voltage,
        #[serde(default)]
        delay_ms: u64,
    },
    Aux {
        on: bool,
        #[serde(default)]
        delay_ms: u64,
    },
    /// Suspend without touching any output.
    Wait { ms: u64 },
}
