//! Power rail controller.
//!
//! The rail is one enumerated output: every supported voltage level maps
//! 1:1 to a hardware code.  The current level is never stored directly; it
//! is the reverse lookup of the last code the port confirmed.
//!
//! | Level | Code |
//! |-------|------|
//! | off   | 0    |
//! | 12 V  | 1    |
//! | 24 V  | 2    |
//! | 110 V | 4    |
//! | 220 V | 8    |
//!
//! The off level is reached through the port's dedicated de-energise
//! command, never through a code-0 select.

use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::BenchEvent;
use crate::app::ports::{Clock, EventSink, OutputPort};
use crate::app::service::Bench;
use crate::error::{Error, Result};
use crate::safety::PowerObserver;

// ---------------------------------------------------------------------------
// Levels and codes
// ---------------------------------------------------------------------------

/// A rail voltage in volts.  `Voltage::OFF` is the de-energised rail.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Voltage(pub u16);

impl Voltage {
    pub const OFF: Voltage = Voltage(0);
}

impl From<u16> for Voltage {
    fn from(volts: u16) -> Self {
        Self(volts)
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}V", self.0)
    }
}

/// One row of the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltageCode {
    pub volts: Voltage,
    pub code: u8,
}

/// Bidirectional level ↔ code mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoltageTable {
    entries: Vec<VoltageCode>,
}

impl VoltageTable {
    pub fn new(entries: impl IntoIterator<Item = VoltageCode>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Hardware code for `level`, if the level is supported.
    pub fn code_for(&self, level: Voltage) -> Option<u8> {
        self.entries.iter().find(|e| e.volts == level).map(|e| e.code)
    }

    /// Reverse lookup of a hardware code.
    pub fn level_for(&self, code: u8) -> Option<Voltage> {
        self.entries.iter().find(|e| e.code == code).map(|e| e.volts)
    }

    pub fn contains(&self, level: Voltage) -> bool {
        self.code_for(level).is_some()
    }

    pub fn levels(&self) -> impl Iterator<Item = Voltage> + '_ {
        self.entries.iter().map(|e| e.volts)
    }

    pub fn entries(&self) -> &[VoltageCode] {
        &self.entries
    }
}

impl Default for VoltageTable {
    fn default() -> Self {
        Self::new([(0u16, 0u8), (12, 1), (24, 2), (110, 4), (220, 8)].map(|(volts, code)| {
            VoltageCode {
                volts: Voltage(volts),
                code,
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// Controller state
// ---------------------------------------------------------------------------

/// Tracked rail code, aux output and the rail's observer chain.
#[derive(Debug)]
pub struct PowerController {
    table: VoltageTable,
    code: u8,
    aux: bool,
    chain: Vec<PowerObserver>,
}

impl PowerController {
    pub fn new(table: VoltageTable) -> Self {
        let code = table.code_for(Voltage::OFF).unwrap_or(0);
        Self {
            table,
            code,
            aux: false,
            chain: vec![PowerObserver::ChangeTracker],
        }
    }

    pub fn table(&self) -> &VoltageTable {
        &self.table
    }

    /// Last confirmed rail code.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Current level, `None` if the confirmed code has no table entry.
    pub fn voltage(&self) -> Option<Voltage> {
        self.table.level_for(self.code)
    }

    pub fn aux(&self) -> bool {
        self.aux
    }

    /// Change tracker for the rail.  `false` when the code is unchanged.
    pub fn track(&mut self, code: u8) -> bool {
        let changed = self.code != code;
        self.code = code;
        changed
    }

    /// Change tracker for the aux output.
    pub fn track_aux(&mut self, on: bool) -> bool {
        let changed = self.aux != on;
        self.aux = on;
        changed
    }

    pub fn attach(&mut self, observer: PowerObserver) {
        self.chain.push(observer);
    }

    pub fn chain(&self) -> &[PowerObserver] {
        &self.chain
    }
}

// ---------------------------------------------------------------------------
// Caller-facing handle
// ---------------------------------------------------------------------------

/// Power operations on a [`Bench`].
pub struct Power<'a, P, C, S> {
    pub(crate) bench: &'a mut Bench<P, C, S>,
}

impl<P: OutputPort, C: Clock, S: EventSink> Power<'_, P, C, S> {
    /// Switch the rail to `voltage`.
    ///
    /// ```ignore
    /// bench.power().set(Voltage(24), 3000)?;
    /// bench.power().set(Voltage::OFF, 0)?;
    /// ```
    pub fn set(&mut self, voltage: impl Into<Voltage>, delay_ms: u64) -> Result<()> {
        let voltage = voltage.into();
        let code = self.bench.power.table().code_for(voltage).ok_or_else(|| {
            warn!("Invalid voltage value → {voltage}");
            Error::InvalidVoltage(voltage)
        })?;
        self.bench.ensure_connected()?;
        self.bench.catch_up()?;

        if voltage == Voltage::OFF {
            self.bench.port.power_off()?;
        } else {
            self.bench.port.select_power(code)?;
        }
        info!("Power set to {voltage}");
        let settled = self.bench.settle();
        self.bench.sink.emit(&BenchEvent::PowerSet(voltage));
        settled?;
        self.bench.delay(delay_ms)
    }

    /// Switch the independent auxiliary output.
    pub fn aux(&mut self, on: bool, delay_ms: u64) -> Result<()> {
        self.bench.ensure_connected()?;
        self.bench.catch_up()?;
        self.bench.port.set_aux(on)?;
        let settled = self.bench.settle();
        self.bench.sink.emit(&BenchEvent::AuxSet(on));
        settled?;
        self.bench.delay(delay_ms)
    }

    /// Forbid a level.  Reaching it forces the rail off and raises
    /// [`Error::ProhibitedState`].
    pub fn add_prohibited_voltage(&mut self, voltage: impl Into<Voltage>) -> Result<()> {
        let voltage = voltage.into();
        if !self.bench.power.table().contains(voltage) {
            return Err(Error::InvalidVoltage(voltage));
        }
        if voltage == Voltage::OFF {
            return Err(Error::Config("the off level cannot be prohibited"));
        }
        info!("Prohibited voltage registered: {voltage}");
        self.bench.power.attach(PowerObserver::ProhibitedVoltage(voltage));
        Ok(())
    }
}
