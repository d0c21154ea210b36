//! GPIO output adapter: drives a fixture straight from digital pins.
//!
//! Any [`StatefulOutputPin`] works: one pin per relay coil, one pin per bit
//! of the rail code, and one pin for the aux output.
//!
//! ```text
//!   relay 1 ──▶ pins[0]          rail code bit 0 ──▶ rail[0]   (12 V)
//!   relay 2 ──▶ pins[1]          rail code bit 1 ──▶ rail[1]   (24 V)
//!   ...                          rail code bit 2 ──▶ rail[2]   (110 V)
//!                                rail code bit 3 ──▶ rail[3]   (220 V)
//! ```
//!
//! Pins do not report changes on their own, so the adapter reads each pin
//! back before and after driving it and queues the difference.  Relay
//! boards with inverted inputs are handled with [`GpioOutputs::active_low`].

use std::collections::{BTreeMap, VecDeque};

use embedded_hal::digital::StatefulOutputPin;
use log::{debug, warn};

use crate::app::ports::{OutputChange, OutputPort, PortError};
use crate::relays::RelayId;

pub struct GpioOutputs<P> {
    relays: BTreeMap<RelayId, P>,
    rail: Vec<P>,
    aux: P,
    active_low: bool,
    pending: VecDeque<OutputChange>,
}

impl<P: StatefulOutputPin> GpioOutputs<P> {
    /// Rail pins beyond the eighth are released and left undriven: a rail
    /// code is a `u8`.
    pub fn new(relays: impl IntoIterator<Item = (RelayId, P)>, mut rail: Vec<P>, aux: P) -> Self {
        let width = u8::BITS as usize;
        if rail.len() > width {
            warn!(
                "GpioOutputs: {} rail pins given, only the first {width} carry the code",
                rail.len()
            );
            rail.truncate(width);
        }
        Self {
            relays: relays.into_iter().collect(),
            rail,
            aux,
            active_low: false,
            pending: VecDeque::new(),
        }
    }

    /// Treat a low relay pin as an energised coil.
    #[must_use]
    pub fn active_low(mut self) -> Self {
        self.active_low = true;
        self
    }

    fn relay_pin(&mut self, relay: RelayId) -> Result<&mut P, PortError> {
        self.relays
            .get_mut(&relay)
            .ok_or(PortError::WriteFailed("no pin for relay"))
    }

    fn drive_relay(&mut self, relay: RelayId, on: bool) -> Result<(), PortError> {
        let active_low = self.active_low;
        let pin = self.relay_pin(relay)?;
        let before = pin.is_set_high().map_err(|e| read_error(&e, "relay"))? != active_low;
        let level = on != active_low;
        let written = if level { pin.set_high() } else { pin.set_low() };
        written.map_err(|e| write_error(&e, "relay"))?;
        let after = pin.is_set_high().map_err(|e| read_error(&e, "relay"))? != active_low;
        if before != after {
            self.pending.push_back(OutputChange::Relay { relay, on: after });
        }
        Ok(())
    }

    fn rail_code(&mut self) -> Result<u8, PortError> {
        let mut code = 0u8;
        for (bit, pin) in self.rail.iter_mut().enumerate() {
            if pin.is_set_high().map_err(|e| read_error(&e, "rail"))? {
                code |= 1 << bit;
            }
        }
        Ok(code)
    }

    fn drive_rail(&mut self, code: u8) -> Result<(), PortError> {
        let needed = (u8::BITS - code.leading_zeros()) as usize;
        if needed > self.rail.len() {
            warn!("GpioOutputs: code {code} needs more than {} rail pins", self.rail.len());
            return Err(PortError::WriteFailed("rail code out of range"));
        }
        let before = self.rail_code()?;
        // Release first so two levels are never selected together.
        for pin in &mut self.rail {
            pin.set_low().map_err(|e| write_error(&e, "rail"))?;
        }
        for (bit, pin) in self.rail.iter_mut().enumerate() {
            if code & (1 << bit) != 0 {
                pin.set_high().map_err(|e| write_error(&e, "rail"))?;
            }
        }
        let after = self.rail_code()?;
        if before != after {
            self.pending.push_back(OutputChange::Power { code: after });
        }
        Ok(())
    }
}

impl<P: StatefulOutputPin> OutputPort for GpioOutputs<P> {
    fn relays_on(&mut self, relays: &[RelayId]) -> Result<(), PortError> {
        for &relay in relays {
            self.drive_relay(relay, true)?;
        }
        Ok(())
    }

    fn relays_off(&mut self, relays: &[RelayId]) -> Result<(), PortError> {
        for &relay in relays {
            self.drive_relay(relay, false)?;
        }
        Ok(())
    }

    fn select_power(&mut self, code: u8) -> Result<(), PortError> {
        self.drive_rail(code)
    }

    fn power_off(&mut self) -> Result<(), PortError> {
        self.drive_rail(0)
    }

    fn set_aux(&mut self, on: bool) -> Result<(), PortError> {
        let before = self.aux.is_set_high().map_err(|e| read_error(&e, "aux"))?;
        let written = if on { self.aux.set_high() } else { self.aux.set_low() };
        written.map_err(|e| write_error(&e, "aux"))?;
        if before != on {
            self.pending.push_back(OutputChange::Aux { on });
        }
        Ok(())
    }

    fn read_relay(&mut self, relay: RelayId) -> Result<bool, PortError> {
        let active_low = self.active_low;
        let pin = self
            .relays
            .get_mut(&relay)
            .ok_or(PortError::ReadFailed("no pin for relay"))?;
        Ok(pin.is_set_high().map_err(|e| read_error(&e, "relay"))? != active_low)
    }

    fn read_power(&mut self) -> Result<u8, PortError> {
        self.rail_code()
    }

    fn read_aux(&mut self) -> Result<bool, PortError> {
        self.aux.is_set_high().map_err(|e| read_error(&e, "aux"))
    }

    fn next_change(&mut self) -> Option<OutputChange> {
        self.pending.pop_front()
    }
}

fn write_error<E: embedded_hal::digital::Error>(e: &E, line: &'static str) -> PortError {
    debug!("GpioOutputs: {line} write failed: {:?}", e.kind());
    PortError::WriteFailed(line)
}

fn read_error<E: embedded_hal::digital::Error>(e: &E, line: &'static str) -> PortError {
    debug!("GpioOutputs: {line} read-back failed: {:?}", e.kind());
    PortError::ReadFailed(line)
}
