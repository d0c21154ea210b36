//! Constraint registry and observers.
//!
//! Every output owns an ordered chain of observers.  The engine applies the
//! change tracker itself and then hands the rest of the chain to
//! [`ConstraintRegistry::on_relay`] / [`ConstraintRegistry::on_power`], the
//! only two places where observer variants are dispatched.
//!
//! ## Violation lifecycle
//!
//! 1. A transition reaches an output whose chain holds a constraint.
//! 2. The constraint returns a [`Reaction`] (force a relay off, clear the
//!    bank, switch the rail off) together with the violation.
//! 3. The engine writes the reaction to the port first; the forced
//!    transitions flow back through the same chains.
//! 4. Only after the queue has drained is the violation returned to the
//!    caller.
//!
//! Observers keep no state between notifications, except timeouts whose
//! countdowns live in the [`TimeoutTable`].

use log::{error, warn};

use crate::error::{Error, ProhibitedState};
use crate::power::{Voltage, VoltageTable};
use crate::relays::{RelayId, RelaySet};
use crate::scheduler::{TimeoutTable, TimerId};

// ---------------------------------------------------------------------------
// Observer variants
// ---------------------------------------------------------------------------

/// Index of a registered prohibited combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinationId(pub(crate) usize);

/// Observers that can sit on a relay's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayObserver {
    /// Enabled/disabled bookkeeping.  Always first.
    ChangeTracker,
    /// The relay must never be enabled.
    ProhibitedState,
    /// The relay is a member of a prohibited combination.
    ProhibitedCombination(CombinationId),
    /// The relay has an on-time limit.
    Timeout(TimerId),
}

impl RelayObserver {
    /// Firing order across kinds.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::ChangeTracker => 0,
            Self::ProhibitedState => 1,
            Self::ProhibitedCombination(_) => 2,
            Self::Timeout(_) => 3,
        }
    }
}

/// Observers that can sit on the power rail's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerObserver {
    ChangeTracker,
    ProhibitedVoltage(Voltage),
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// Corrective hardware action requested by an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Turn every relay off.
    ClearBank,
    /// Turn one relay off through the bank's disable path.
    DisableRelay(RelayId),
    /// De-energise the rail.
    PowerOff,
}

/// Outcome of running one chain: corrective actions first, then faults.
#[derive(Debug, Default)]
pub struct Verdict {
    pub reactions: Vec<Reaction>,
    pub violations: Vec<Error>,
}

impl Verdict {
    fn react(&mut self, reaction: Reaction) {
        if !self.reactions.contains(&reaction) {
            self.reactions.push(reaction);
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owns the registered combinations and dispatches observer chains.
#[derive(Debug, Default)]
pub struct ConstraintRegistry {
    combinations: Vec<RelaySet>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_combination(&mut self, combination: RelaySet) -> CombinationId {
        self.combinations.push(combination);
        CombinationId(self.combinations.len() - 1)
    }

    pub fn combination(&self, id: CombinationId) -> Option<&RelaySet> {
        self.combinations.get(id.0)
    }

    /// Run a relay's chain for a transition the tracker has already applied.
    /// `enabled` is the up-to-date enabled set.
    pub fn on_relay(
        &self,
        relay: RelayId,
        on: bool,
        chain: &[RelayObserver],
        enabled: &RelaySet,
        timers: &mut TimeoutTable,
        now_ms: u64,
    ) -> Verdict {
        let mut verdict = Verdict::default();
        for observer in chain {
            match *observer {
                RelayObserver::ChangeTracker => {}
                RelayObserver::ProhibitedState => {
                    if on {
                        error!("Relay {relay} is prohibited and was enabled!");
                        verdict.react(Reaction::DisableRelay(relay));
                        verdict
                            .violations
                            .push(ProhibitedState::Relay(relay).into());
                    }
                }
                RelayObserver::ProhibitedCombination(id) => {
                    let Some(combination) = self.combination(id) else {
                        continue;
                    };
                    if on && combination.is_subset(enabled) {
                        let relays: Vec<RelayId> = combination.iter().copied().collect();
                        error!(
                            "Relays {:?} are in a prohibited combination!",
                            relays.iter().map(|r| r.0).collect::<Vec<_>>()
                        );
                        verdict.react(Reaction::ClearBank);
                        verdict.violations.push(Error::ProhibitedCombination(relays));
                    }
                }
                RelayObserver::Timeout(id) => timers.on_transition(id, on, now_ms),
            }
        }
        verdict
    }

    /// Run the rail's chain for a code the tracker has already applied.
    pub fn on_power(&self, code: u8, chain: &[PowerObserver], table: &VoltageTable) -> Verdict {
        let mut verdict = Verdict::default();
        let Some(level) = table.level_for(code) else {
            warn!("Rail reported unmapped code {code}");
            return verdict;
        };
        for observer in chain {
            match *observer {
                PowerObserver::ChangeTracker => {}
                PowerObserver::ProhibitedVoltage(prohibited) => {
                    if level == prohibited {
                        error!("Prohibited voltage → {prohibited}");
                        verdict.react(Reaction::PowerOff);
                        verdict
                            .violations
                            .push(ProhibitedState::Voltage(prohibited).into());
                    }
                }
            }
        }
        verdict
    }
}
