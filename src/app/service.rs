//! Bench engine: the hexagonal core.
//!
//! [`Bench`] owns the relay bank, the power controller, the constraint
//! registry and the timeout countdowns.  Hardware writes go out through the
//! [`OutputPort`]; the changes the port reports come back through one
//! dispatch loop:
//!
//! ```text
//!   relays().enable({1,3})
//!        │
//!        ▼
//!   port.relays_on ──▶ port change queue ──▶ settle() ──▶ notify(change)
//!        ▲                                                     │
//!        │               corrective writes (Reaction)          │
//!        └─────────────────────────────────────────────────────┘
//! ```
//!
//! The port's change queue is the work queue: a corrective write made while
//! a chain runs only appends to it, so one chain always finishes before the
//! next transition is dispatched and nothing recurses.  `settle` stops after
//! `max_cascade` changes and forces every output off.

use heapless::HistoryBuffer;
use log::{debug, error, info, warn};

use crate::adapters::log_sink::LogEventSink;
use crate::config::{BenchConfig, Constraints};
use crate::error::{Error, Result};
use crate::power::{Power, PowerController, Voltage, VoltageTable};
use crate::relays::{RelayBank, RelayId, RelaySet, Relays};
use crate::safety::{ConstraintRegistry, Reaction, Verdict};
use crate::scheduler::TimeoutTable;

use super::commands::BenchCommand;
use super::events::BenchEvent;
use super::ports::{Clock, EventSink, OutputChange, OutputPort, PortError};

/// Number of violations kept in [`Bench::faults`].
pub const FAULT_HISTORY: usize = 16;

// ───────────────────────────────────────────────────────────────
// Bench
// ───────────────────────────────────────────────────────────────

/// The constraint-enforcing output-state engine for one fixture.
pub struct Bench<P, C, S = LogEventSink> {
    pub(crate) port: P,
    pub(crate) clock: C,
    pub(crate) sink: S,
    pub(crate) bank: RelayBank,
    pub(crate) power: PowerController,
    pub(crate) constraints: ConstraintRegistry,
    pub(crate) timers: TimeoutTable,
    faults: HistoryBuffer<Error, FAULT_HISTORY>,
    connected: bool,
    max_cascade: usize,
}

impl<P: OutputPort, C: Clock, S: EventSink> Bench<P, C, S> {
    /// Validate `config`, drive every relay and the rail off, then register
    /// the configured constraints.
    ///
    /// An unreachable port does not fail construction: the bench comes up
    /// degraded and every hardware operation returns
    /// [`PortError::NotConnected`].
    pub fn new(config: &BenchConfig, port: P, clock: C, sink: S) -> Result<Self> {
        config.validate()?;
        let mut bench = Self {
            port,
            clock,
            sink,
            bank: RelayBank::new(config.relays.iter().copied()),
            power: PowerController::new(VoltageTable::new(config.voltages.iter().copied())),
            constraints: ConstraintRegistry::new(),
            timers: TimeoutTable::new(),
            faults: HistoryBuffer::new(),
            connected: false,
            max_cascade: usize::from(config.max_cascade),
        };
        bench.init();
        bench.register(&config.constraints)?;
        Ok(bench)
    }

    // ── Lifecycle ─────────────────────────────────────────────

    fn init(&mut self) {
        let all = self.all_relays();
        let swept = self
            .port
            .relays_off(&all)
            .and_then(|()| self.port.power_off())
            .and_then(|()| self.port.read_aux());

        match swept {
            Ok(aux) => {
                self.connected = true;
                self.power.track_aux(aux);
                if let Err(e) = self.settle() {
                    error!("Start-up sweep: {e}");
                }
                self.confirm_sweep(&all);
                info!("Bench initialised: {} relays off, rail off", all.len());
                self.sink.emit(&BenchEvent::Initialized { relays: all.len() });
            }
            Err(e) => {
                error!("{e}");
                error!("DAQ not connected");
                self.sink.emit(&BenchEvent::Degraded);
            }
        }
    }

    /// Seed the partition and the rail code from read-back, so an output
    /// that did not follow the sweep is still tracked.
    fn confirm_sweep(&mut self, all: &[RelayId]) {
        self.bank.reset_disabled();
        for &relay in all {
            match self.port.read_relay(relay) {
                Ok(true) => {
                    warn!("Relay {relay} still reads on after the start-up sweep");
                    self.bank.track(relay, true);
                }
                Ok(false) => {}
                Err(e) => warn!("Relay {relay} read-back failed: {e}"),
            }
        }
        match self.port.read_power() {
            Ok(code) => {
                if self.power.track(code) {
                    warn!("Rail still reads code {code} after the start-up sweep");
                }
            }
            Err(e) => warn!("Rail read-back failed: {e}"),
        }
    }

    fn register(&mut self, constraints: &Constraints) -> Result<()> {
        for combination in &constraints.prohibited_combinations {
            self.relays()
                .add_prohibited_combination(combination.iter().copied())?;
        }
        for &relay in &constraints.prohibited_relays {
            self.relays().add_prohibited_relay(relay)?;
        }
        for rule in &constraints.timeouts {
            self.relays()
                .add_timeout(rule.relay, rule.timeout_ms, rule.fatal)?;
        }
        for &voltage in &constraints.prohibited_voltages {
            self.power().add_prohibited_voltage(voltage)?;
        }
        Ok(())
    }

    // ── Caller-facing surface ─────────────────────────────────

    /// Relay operations and relay constraint registration.
    pub fn relays(&mut self) -> Relays<'_, P, C, S> {
        Relays { bench: self }
    }

    /// Power rail operations and voltage constraint registration.
    pub fn power(&mut self) -> Power<'_, P, C, S> {
        Power { bench: self }
    }

    /// Suspend for `ms` milliseconds.
    ///
    /// Countdowns whose deadline falls inside the delay expire at their
    /// deadline, in deadline order.  The first fatal expiry ends the delay
    /// early with its error.
    pub fn delay(&mut self, ms: u64) -> Result<()> {
        let target = self.clock.now_ms().saturating_add(ms);
        while let Some(deadline) = self.timers.next_deadline().filter(|&d| d <= target) {
            let now = self.clock.now_ms();
            if deadline > now {
                self.clock.sleep_ms(deadline - now);
            }
            self.expire_timers(self.clock.now_ms())?;
        }
        let now = self.clock.now_ms();
        if target > now {
            self.clock.sleep_ms(target - now);
        }
        Ok(())
    }

    /// Dispatch pending external changes and expire due countdowns.
    pub fn poll(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let settled = self.settle();
        let expired = self.expire_timers(self.clock.now_ms());
        settled.and(expired)
    }

    /// Run one serialised command.
    pub fn handle_command(&mut self, cmd: &BenchCommand) -> Result<()> {
        debug!("Command: {cmd:?}");
        match cmd {
            BenchCommand::Enable { relays, delay_ms } => {
                self.relays().enable(relays.iter().copied(), *delay_ms)
            }
            BenchCommand::Disable { relays, delay_ms } => {
                self.relays().disable(relays.iter().copied(), *delay_ms)
            }
            BenchCommand::Set { relays, delay_ms } => {
                self.relays().set(relays.iter().copied(), *delay_ms)
            }
            BenchCommand::Clear { delay_ms } => self.relays().clear(*delay_ms),
            BenchCommand::Power { volts, delay_ms } => self.power().set(*volts, *delay_ms),
            BenchCommand::Aux { on, delay_ms } => self.power().aux(*on, *delay_ms),
            BenchCommand::Wait { ms } => self.delay(*ms),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn valid_relays(&self) -> &RelaySet {
        self.bank.valid()
    }

    pub fn enabled(&self) -> &RelaySet {
        self.bank.enabled()
    }

    pub fn disabled(&self) -> &RelaySet {
        self.bank.disabled()
    }

    /// Rail level from the last confirmed code, `None` if unmapped.
    pub fn voltage(&self) -> Option<Voltage> {
        self.power.voltage()
    }

    pub fn aux(&self) -> bool {
        self.power.aux()
    }

    /// False when the start-up sweep could not reach the port.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True if any countdown of `relay` is running.
    pub fn is_timeout_armed(&self, relay: impl Into<RelayId>) -> bool {
        self.timers.is_armed(relay.into())
    }

    /// Recent violations, oldest first.
    pub fn faults(&self) -> impl Iterator<Item = &Error> + '_ {
        self.faults.oldest_ordered()
    }

    pub fn last_fault(&self) -> Option<&Error> {
        self.faults.recent()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable access to the port, e.g. to inject panel operations in a
    /// simulation.  Changes made here are dispatched by the next operation
    /// or [`poll`](Self::poll).
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── Engine internals ──────────────────────────────────────

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(PortError::NotConnected.into())
        }
    }

    /// Write the minimal relay commands that bring `set` to `on`, then
    /// dispatch the resulting transitions.
    pub(crate) fn switch_relays(&mut self, set: &RelaySet, on: bool) -> Result<()> {
        self.ensure_connected()?;
        self.catch_up()?;

        let targets = if on {
            self.bank.to_activate(set)
        } else {
            self.bank.to_deactivate(set)
        };
        if !targets.is_empty() {
            if on {
                self.port.relays_on(&targets)?;
            } else {
                self.port.relays_off(&targets)?;
            }
        }

        let settled = self.settle();
        info!(
            "Relays enabled: {:?}",
            self.bank.enabled().iter().map(|r| r.0).collect::<Vec<_>>()
        );
        self.sink.emit(&BenchEvent::RelaysChanged {
            enabled: self.bank.enabled().iter().copied().collect(),
        });
        settled
    }

    /// Bring the bench up to date before a new write: dispatch pending
    /// changes, then expire every countdown whose deadline has passed.
    pub(crate) fn catch_up(&mut self) -> Result<()> {
        self.settle()?;
        self.expire_timers(self.clock.now_ms())
    }

    /// Drain the port's change queue, running every chain to completion.
    ///
    /// Corrective writes are applied as soon as their chain finishes; the
    /// first violation is returned once the queue is empty.
    pub(crate) fn settle(&mut self) -> Result<()> {
        let mut first = None;
        let mut processed = 0usize;
        while let Some(change) = self.port.next_change() {
            processed += 1;
            if processed > self.max_cascade {
                self.track_only(change);
                return Err(self.fail_safe());
            }
            let Verdict {
                reactions,
                violations,
            } = self.notify(change);
            for reaction in reactions {
                if let Err(e) = self.react(reaction) {
                    error!("Corrective action {reaction:?} failed: {e}");
                    keep_first(&mut first, e.into());
                }
            }
            for violation in violations {
                self.report(&violation);
                keep_first(&mut first, violation);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// The single dispatch point: change tracker first, then the rest of
    /// the output's chain.
    fn notify(&mut self, change: OutputChange) -> Verdict {
        match change {
            OutputChange::Relay { relay, on } => {
                if !self.bank.track(relay, on) {
                    return Verdict::default();
                }
                let now = self.clock.now_ms();
                self.constraints.on_relay(
                    relay,
                    on,
                    self.bank.chain(relay),
                    self.bank.enabled(),
                    &mut self.timers,
                    now,
                )
            }
            OutputChange::Power { code } => {
                if !self.power.track(code) {
                    return Verdict::default();
                }
                self.constraints
                    .on_power(code, self.power.chain(), self.power.table())
            }
            OutputChange::Aux { on } => {
                self.power.track_aux(on);
                Verdict::default()
            }
        }
    }

    fn react(&mut self, reaction: Reaction) -> core::result::Result<(), PortError> {
        match reaction {
            Reaction::ClearBank => {
                let all = self.all_relays();
                self.port.relays_off(&all)
            }
            Reaction::DisableRelay(relay) => self.port.relays_off(&[relay]),
            Reaction::PowerOff => self.port.power_off(),
        }
    }

    /// Expire every countdown due at `now_ms`.  A countdown whose relay is
    /// already disabled expires silently.
    fn expire_timers(&mut self, now_ms: u64) -> Result<()> {
        let mut first = None;
        while let Some(expired) = self.timers.take_due(now_ms) {
            let relay = expired.relay;
            if !self.bank.is_enabled(relay) {
                debug!("Timeout for relay {relay} expired after it was disabled");
                continue;
            }
            warn!(
                "Relay {relay} has been disabled due to timeout! → {}ms (due at t={}ms)",
                expired.timeout_ms, expired.deadline_ms
            );
            self.sink.emit(&BenchEvent::TimeoutExpired {
                relay,
                timeout_ms: expired.timeout_ms,
                fatal: expired.fatal,
            });
            let disabled = self
                .port
                .relays_off(&[relay])
                .map_err(Error::from)
                .and_then(|()| self.settle());
            if let Err(e) = disabled {
                keep_first(&mut first, e);
            }
            if expired.fatal {
                let e = Error::TimeoutExceeded {
                    relay,
                    timeout_ms: expired.timeout_ms,
                };
                error!("{e}");
                self.report(&e);
                keep_first(&mut first, e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Force every output off and resynchronise bookkeeping without
    /// running constraint observers.
    fn fail_safe(&mut self) -> Error {
        error!(
            "Notification cascade exceeded {} changes, forcing every output off",
            self.max_cascade
        );
        let all = self.all_relays();
        if let Err(e) = self
            .port
            .relays_off(&all)
            .and_then(|()| self.port.power_off())
        {
            error!("Fail-safe write failed: {e}");
        }
        for _ in 0..self.max_cascade.saturating_add(all.len() + 2) {
            let Some(change) = self.port.next_change() else {
                break;
            };
            self.track_only(change);
        }
        let e = Error::CascadeOverflow;
        self.report(&e);
        e
    }

    fn track_only(&mut self, change: OutputChange) {
        match change {
            OutputChange::Relay { relay, on } => {
                self.bank.track(relay, on);
                if !on {
                    self.timers.cancel_relay(relay);
                }
            }
            OutputChange::Power { code } => {
                self.power.track(code);
            }
            OutputChange::Aux { on } => {
                self.power.track_aux(on);
            }
        }
    }

    fn report(&mut self, violation: &Error) {
        self.faults.write(violation.clone());
        self.sink.emit(&BenchEvent::Violation(violation.clone()));
    }

    fn all_relays(&self) -> Vec<RelayId> {
        self.bank.valid().iter().copied().collect()
    }
}

fn keep_first(first: &mut Option<Error>, e: Error) {
    if first.is_none() {
        *first = Some(e);
    }
}
