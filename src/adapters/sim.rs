//! Simulated DAQ adapter.
//!
//! An in-memory fixture that implements [`OutputPort`]: relay lines, the
//! rail code and the aux output are plain values, and every value change is
//! queued as an [`OutputChange`] exactly like a real DAQ's change
//! notifications.  The `panel_*` methods change outputs behind the bench's
//! back, as an operator or a second control path would.
//!
//! Every accepted command is also recorded in [`SimulatedDaq::writes`] so
//! tests can assert on the exact hardware traffic.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, trace};

use crate::app::ports::{OutputChange, OutputPort, PortError};
use crate::relays::RelayId;

/// One command the bench sent to the DAQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortWrite {
    RelaysOn(Vec<RelayId>),
    RelaysOff(Vec<RelayId>),
    SelectPower(u8),
    PowerOff,
    Aux(bool),
}

pub struct SimulatedDaq {
    lines: BTreeMap<RelayId, bool>,
    power: u8,
    aux: bool,
    connected: bool,
    pending: VecDeque<OutputChange>,
    writes: Vec<PortWrite>,
}

impl SimulatedDaq {
    /// A reachable DAQ with the given relay lines, all released.
    pub fn new(lines: impl IntoIterator<Item = RelayId>) -> Self {
        Self {
            lines: lines.into_iter().map(|r| (r, false)).collect(),
            power: 0,
            aux: false,
            connected: true,
            pending: VecDeque::new(),
            writes: Vec::new(),
        }
    }

    /// A DAQ that refuses every command with [`PortError::NotConnected`].
    pub fn disconnected(lines: impl IntoIterator<Item = RelayId>) -> Self {
        Self {
            connected: false,
            ..Self::new(lines)
        }
    }

    // ── Panel operations ──────────────────────────────────────

    /// Switch a relay without going through the bench.
    pub fn panel_relay(&mut self, relay: impl Into<RelayId>, on: bool) {
        let relay = relay.into();
        if self.drive(relay, on).is_err() {
            debug!("SimulatedDaq: panel ignored unknown relay {relay}");
        }
    }

    /// Put a raw code on the rail without going through the bench.
    pub fn panel_power(&mut self, code: u8) {
        self.drive_power(code);
    }

    pub fn panel_aux(&mut self, on: bool) {
        self.drive_aux(on);
    }

    // ── Inspection ────────────────────────────────────────────

    /// Physical state of a relay line, `None` for an unknown line.
    pub fn relay(&self, relay: impl Into<RelayId>) -> Option<bool> {
        self.lines.get(&relay.into()).copied()
    }

    pub fn power_code(&self) -> u8 {
        self.power
    }

    pub fn aux(&self) -> bool {
        self.aux
    }

    pub fn writes(&self) -> &[PortWrite] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    // ── Line drivers ──────────────────────────────────────────

    fn drive(&mut self, relay: RelayId, on: bool) -> Result<(), PortError> {
        let line = self
            .lines
            .get_mut(&relay)
            .ok_or(PortError::WriteFailed("unknown relay line"))?;
        if *line != on {
            *line = on;
            trace!("SimulatedDaq: relay {relay} -> {on}");
            self.pending.push_back(OutputChange::Relay { relay, on });
        }
        Ok(())
    }

    fn drive_power(&mut self, code: u8) {
        if self.power != code {
            self.power = code;
            trace!("SimulatedDaq: rail code -> {code}");
            self.pending.push_back(OutputChange::Power { code });
        }
    }

    fn drive_aux(&mut self, on: bool) {
        if self.aux != on {
            self.aux = on;
            self.pending.push_back(OutputChange::Aux { on });
        }
    }

    fn check(&self) -> Result<(), PortError> {
        if self.connected {
            Ok(())
        } else {
            Err(PortError::NotConnected)
        }
    }

    fn drive_batch(&mut self, relays: &[RelayId], on: bool) -> Result<(), PortError> {
        self.check()?;
        if relays.iter().any(|r| !self.lines.contains_key(r)) {
            return Err(PortError::WriteFailed("unknown relay line"));
        }
        self.writes.push(if on {
            PortWrite::RelaysOn(relays.to_vec())
        } else {
            PortWrite::RelaysOff(relays.to_vec())
        });
        for &relay in relays {
            self.drive(relay, on)?;
        }
        Ok(())
    }
}

impl OutputPort for SimulatedDaq {
    fn relays_on(&mut self, relays: &[RelayId]) -> Result<(), PortError> {
        self.drive_batch(relays, true)
    }

    fn relays_off(&mut self, relays: &[RelayId]) -> Result<(), PortError> {
        self.drive_batch(relays, false)
    }

    fn select_power(&mut self, code: u8) -> Result<(), PortError> {
        self.check()?;
        self.writes.push(PortWrite::SelectPower(code));
        self.drive_power(code);
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), PortError> {
        self.check()?;
        self.writes.push(PortWrite::PowerOff);
        self.drive_power(0);
        Ok(())
    }

    fn set_aux(&mut self, on: bool) -> Result<(), PortError> {
        self.check()?;
        self.writes.push(PortWrite::Aux(on));
        self.drive_aux(on);
        Ok(())
    }

    fn read_relay(&mut self, relay: RelayId) -> Result<bool, PortError> {
        self.check()?;
        self.relay(relay).ok_or(PortError::ReadFailed("unknown relay line"))
    }

    fn read_power(&mut self) -> Result<u8, PortError> {
        self.check()?;
        Ok(self.power)
    }

    fn read_aux(&mut self) -> Result<bool, PortError> {
        self.check()?;
        Ok(self.aux)
    }

    fn next_change(&mut self) -> Option<OutputChange> {
        self.pending.pop_front()
    }
}
