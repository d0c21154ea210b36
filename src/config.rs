//! Fixture configuration
//!
//! Everything that describes one fixture: which relay lines exist, the rail
//! level table, and the constraints registered at start-up.  Loaded from
//! JSON through the [`ConfigPort`](crate::app::ports::ConfigPort).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::power::{Voltage, VoltageCode, VoltageTable};
use crate::relays::RelayId;

/// Upper bound on relay lines per fixture.
pub const MAX_RELAYS: usize = 64;

/// Core fixture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Relay lines present on the fixture
    pub relays: Vec<RelayId>,
    /// Rail level ↔ hardware code table, must contain the off level at code 0
    pub voltages: Vec<VoltageCode>,
    /// Constraints registered when the bench is built
    pub constraints: Constraints,
    /// Maximum output changes dispatched by one operation before the bench
    /// forces everything off
    pub max_cascade: u16,
}

/// Start-up constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub prohibited_combinations: Vec<Vec<RelayId>>,
    pub prohibited_voltages: Vec<Voltage>,
    pub prohibited_relays: Vec<RelayId>,
    pub timeouts: Vec<TimeoutRule>,
}

/// On-time limit for one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutRule {
    pub relay: RelayId,
    pub timeout_ms: u64,
    #[serde(default)]
    pub fatal: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            relays: (1..=18).map(RelayId).collect(),
            voltages: VoltageTable::default().entries().to_vec(),
            constraints: Constraints::default(),
            max_cascade: 256,
        }
    }
}

impl BenchConfig {
    /// Structural checks.  Constraint members are checked again when they
    /// are registered.
    pub fn validate(&self) -> Result<(), Error> {
        if self.relays.is_empty() {
            return Err(Error::Config("at least one relay is required"));
        }
        if self.relays.len() > MAX_RELAYS {
            return Err(Error::Config("too many relays"));
        }
        if self.relays.contains(&RelayId(0)) {
            return Err(Error::Config("relay id 0 is reserved"));
        }
        let unique: BTreeSet<RelayId> = self.relays.iter().copied().collect();
        if unique.len() != self.relays.len() {
            return Err(Error::Config("duplicate relay id"));
        }

        match self.voltages.iter().find(|e| e.volts == Voltage::OFF) {
            None => return Err(Error::Config("voltage table has no off level")),
            Some(off) if off.code != 0 => {
                return Err(Error::Config("off level must use code 0"));
            }
            Some(_) => {}
        }
        let levels: BTreeSet<Voltage> = self.voltages.iter().map(|e| e.volts).collect();
        let codes: BTreeSet<u8> = self.voltages.iter().map(|e| e.code).collect();
        if levels.len() != self.voltages.len() || codes.len() != self.voltages.len() {
            return Err(Error::Config("duplicate voltage level or code"));
        }

        if self.max_cascade == 0 {
            return Err(Error::Config("max_cascade must be positive"));
        }
        Ok(())
    }
}
