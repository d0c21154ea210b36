//! Relay bank.
//!
//! Tracks the partition of the valid relay set into enabled and disabled
//! relays, and the ordered observer chain attached to every relay.  The
//! partition is only mutated by the change tracker, i.e. in response to a
//! transition the output port confirmed.
//!
//! The caller-facing operations live on the [`Relays`] handle obtained from
//! [`Bench::relays`](crate::Bench::relays):
//!
//! ```text
//!   enable(R)   toActivate   = R − Enabled   ──▶ relays_on
//!   disable(R)  toDeactivate = R − Disabled  ──▶ relays_off
//!   set(R)      disable(Valid − R) then enable(R)
//!   clear()     disable(Valid)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{Clock, EventSink, OutputPort};
use crate::app::service::Bench;
use crate::error::{Error, Result};
use crate::safety::RelayObserver;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of one relay line.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayId(pub u8);

impl From<u8> for RelayId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered set of relays.
pub type RelaySet = BTreeSet<RelayId>;

// ---------------------------------------------------------------------------
// Bank state
// ---------------------------------------------------------------------------

/// Enabled/disabled bookkeeping plus the per-relay observer chains.
#[derive(Debug)]
pub struct RelayBank {
    valid: RelaySet,
    enabled: RelaySet,
    disabled: RelaySet,
    chains: BTreeMap<RelayId, Vec<RelayObserver>>,
}

impl RelayBank {
    /// Every relay starts disabled with only its change tracker attached.
    pub fn new(valid: impl IntoIterator<Item = RelayId>) -> Self {
        let valid: RelaySet = valid.into_iter().collect();
        let chains = valid
            .iter()
            .map(|&relay| (relay, vec![RelayObserver::ChangeTracker]))
            .collect();
        Self {
            disabled: valid.clone(),
            enabled: RelaySet::new(),
            valid,
            chains,
        }
    }

    pub fn valid(&self) -> &RelaySet {
        &self.valid
    }

    pub fn enabled(&self) -> &RelaySet {
        &self.enabled
    }

    pub fn disabled(&self) -> &RelaySet {
        &self.disabled
    }

    pub fn is_enabled(&self, relay: RelayId) -> bool {
        self.enabled.contains(&relay)
    }

    /// Collect `relays` into a set, failing with every identifier that is
    /// not part of the valid set.
    pub fn relay_set<I>(&self, relays: I) -> Result<RelaySet>
    where
        I: IntoIterator,
        I::Item: Into<RelayId>,
    {
        let set: RelaySet = relays.into_iter().map(Into::into).collect();
        let invalid: Vec<RelayId> = set.difference(&self.valid).copied().collect();
        if invalid.is_empty() {
            Ok(set)
        } else {
            let e = Error::InvalidRelay(invalid);
            warn!("{e}");
            Err(e)
        }
    }

    /// `set − Enabled`, in ascending order.
    pub fn to_activate(&self, set: &RelaySet) -> Vec<RelayId> {
        set.difference(&self.enabled).copied().collect()
    }

    /// `set − Disabled`, in ascending order.
    pub fn to_deactivate(&self, set: &RelaySet) -> Vec<RelayId> {
        set.difference(&self.disabled).copied().collect()
    }

    /// `Valid − set`.
    pub fn complement(&self, set: &RelaySet) -> RelaySet {
        self.valid.difference(set).copied().collect()
    }

    /// Change tracker: apply a confirmed transition to the partition.
    ///
    /// Returns `false` when the transition carries no news (unknown relay or
    /// already in the reported state); the rest of the chain is skipped then.
    pub fn track(&mut self, relay: RelayId, on: bool) -> bool {
        if !self.valid.contains(&relay) {
            warn!("Ignoring transition of unknown relay {relay}");
            return false;
        }
        let (from, to) = if on {
            (&mut self.disabled, &mut self.enabled)
        } else {
            (&mut self.enabled, &mut self.disabled)
        };
        if from.remove(&relay) {
            to.insert(relay);
            true
        } else {
            false
        }
    }

    /// Re-seed the partition after the start-up sweep: everything disabled.
    pub fn reset_disabled(&mut self) {
        self.enabled.clear();
        self.disabled = self.valid.clone();
    }

    /// Append an observer to a relay's chain, after every observer of the
    /// same or an earlier-firing kind.
    pub fn attach(&mut self, relay: RelayId, observer: RelayObserver) {
        if let Some(chain) = self.chains.get_mut(&relay) {
            let at = chain
                .iter()
                .position(|o| o.rank() > observer.rank())
                .unwrap_or(chain.len());
            chain.insert(at, observer);
        }
    }

    /// The observer chain of `relay`, in firing order.
    pub fn chain(&self, relay: RelayId) -> &[RelayObserver] {
        self.chains.get(&relay).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Target buffer
// ---------------------------------------------------------------------------

/// A target state built up one relay at a time and reached in one step
/// with [`Relays::apply`].
///
/// ```ignore
/// let mut target = bench.relays().buffer();
/// target.add(1)?;
/// target.add(3)?;
/// bench.relays().apply(&target, 500)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayBuffer {
    valid: RelaySet,
    relays: RelaySet,
}

impl RelayBuffer {
    /// An empty buffer that only accepts members of `valid`.
    pub fn new(valid: RelaySet) -> Self {
        Self {
            valid,
            relays: RelaySet::new(),
        }
    }

    pub fn add(&mut self, relay: impl Into<RelayId>) -> Result<()> {
        let relay = relay.into();
        if !self.valid.contains(&relay) {
            let e = Error::InvalidRelay(vec![relay]);
            warn!("{e}");
            return Err(e);
        }
        self.relays.insert(relay);
        Ok(())
    }

    /// `false` if `relay` was not buffered.
    pub fn remove(&mut self, relay: impl Into<RelayId>) -> bool {
        self.relays.remove(&relay.into())
    }

    pub fn clear(&mut self) {
        self.relays.clear();
    }

    pub fn relays(&self) -> &RelaySet {
        &self.relays
    }

    pub fn contains(&self, relay: impl Into<RelayId>) -> bool {
        self.relays.contains(&relay.into())
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Caller-facing handle
// ---------------------------------------------------------------------------

/// Relay operations on a [`Bench`].  Every operation validates its relays
/// before touching the hardware and finishes with the requested delay.
pub struct Relays<'a, P, C, S> {
    pub(crate) bench: &'a mut Bench<P, C, S>,
}

impl<P: OutputPort, C: Clock, S: EventSink> Relays<'_, P, C, S> {
    /// Turn on the given relays.
    ///
    /// ```ignore
    /// bench.relays().enable([1], 0)?;
    /// bench.relays().enable([1, 2, 3], 1000)?;
    /// ```
    pub fn enable<I>(&mut self, relays: I, delay_ms: u64) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<RelayId>,
    {
        let set = self.bench.bank.relay_set(relays)?;
        self.bench.switch_relays(&set, true)?;
        self.bench.delay(delay_ms)
    }

    /// Turn off the given relays.
    pub fn disable<I>(&mut self, relays: I, delay_ms: u64) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<RelayId>,
    {
        let set = self.bench.bank.relay_set(relays)?;
        self.bench.switch_relays(&set, false)?;
        self.bench.delay(delay_ms)
    }

    /// Leave exactly `relays` enabled.  Relays outside the target are
    /// disabled first, then the target is enabled.
    pub fn set<I>(&mut self, relays: I, delay_ms: u64) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<RelayId>,
    {
        let set = self.bench.bank.relay_set(relays)?;
        let rest = self.bench.bank.complement(&set);
        self.bench.switch_relays(&rest, false)?;
        self.bench.switch_relays(&set, true)?;
        self.bench.delay(delay_ms)
    }

    /// An empty target buffer for this bench's relays.
    pub fn buffer(&self) -> RelayBuffer {
        RelayBuffer::new(self.bench.bank.valid().clone())
    }

    /// Reach the buffered target: [`set`](Self::set) with its contents.
    pub fn apply(&mut self, buffer: &RelayBuffer, delay_ms: u64) -> Result<()> {
        self.set(buffer.relays().iter().copied(), delay_ms)
    }

    /// Turn every relay off.
    pub fn clear(&mut self, delay_ms: u64) -> Result<()> {
        let all = self.bench.bank.valid().clone();
        self.bench.switch_relays(&all, false)?;
        self.bench.delay(delay_ms)
    }

    /// Forbid a set of relays from ever being enabled together.  Enabling
    /// the last member clears the whole bank and raises
    /// [`Error::ProhibitedCombination`].
    pub fn add_prohibited_combination<I>(&mut self, combination: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<RelayId>,
    {
        let set = self.bench.bank.relay_set(combination)?;
        if set.is_empty() {
            return Err(Error::Config("prohibited combination must name at least one relay"));
        }
        info!("Prohibited combination registered: {:?}", set);
        let id = self.bench.constraints.add_combination(set.clone());
        for relay in set {
            self.bench
                .bank
                .attach(relay, RelayObserver::ProhibitedCombination(id));
        }
        Ok(())
    }

    /// Forbid a single relay from being enabled.  Enabling it turns it back
    /// off and raises [`Error::ProhibitedState`].
    pub fn add_prohibited_relay(&mut self, relay: impl Into<RelayId>) -> Result<()> {
        let relay = self.single(relay)?;
        info!("Prohibited relay registered: {relay}");
        self.bench.bank.attach(relay, RelayObserver::ProhibitedState);
        Ok(())
    }

    /// Limit how long a relay may stay enabled.  On expiry the relay is
    /// disabled; [`Error::TimeoutExceeded`] is raised only when `fatal`.
    ///
    /// A relay that is already enabled starts its countdown now.
    pub fn add_timeout(&mut self, relay: impl Into<RelayId>, timeout_ms: u64, fatal: bool) -> Result<()> {
        let relay = self.single(relay)?;
        let id = self.bench.timers.register(relay, timeout_ms, fatal);
        if self.bench.bank.is_enabled(relay) {
            let now = self.bench.clock.now_ms();
            self.bench.timers.on_transition(id, true, now);
        }
        info!("Timeout registered: relay {relay} → {timeout_ms}ms (fatal: {fatal})");
        self.bench.bank.attach(relay, RelayObserver::Timeout(id));
        Ok(())
    }

    fn single(&self, relay: impl Into<RelayId>) -> Result<RelayId> {
        let relay = relay.into();
        self.bench.bank.relay_set([relay])?;
        Ok(relay)
    }
}
