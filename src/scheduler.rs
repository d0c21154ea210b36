//! Relay timeout countdowns.
//!
//! Each registered timeout is a two-state machine:
//!
//! ```text
//!            relay enabled
//!   Idle ─────────────────────▶ Armed { deadline }
//!    ▲                              │
//!    │  relay disabled / expired    │
//!    └──────────────────────────────┘
//! ```
//!
//! The table only keeps deadlines; nothing here sleeps.  The engine asks
//! for the [`next_deadline`](TimeoutTable::next_deadline) while it is
//! suspended in a delay, and drains expired countdowns with
//! [`take_due`](TimeoutTable::take_due).  An expiry is consumed exactly
//! once, so a disable that lands first simply leaves nothing to expire.

use log::debug;

use crate::relays::RelayId;

// ═══════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════

/// Index of a registered timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(pub(crate) usize);

/// Countdown state of one timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Idle,
    Armed { deadline_ms: u64 },
}

/// A registered on-time limit.
#[derive(Debug, Clone)]
pub struct RelayTimeout {
    pub relay: RelayId,
    pub timeout_ms: u64,
    /// Whether expiry raises an error after the forced disable.
    pub fatal: bool,
    countdown: Countdown,
}

/// A countdown that reached its deadline.  Already back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    pub relay: RelayId,
    pub timeout_ms: u64,
    pub fatal: bool,
    pub deadline_ms: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct TimeoutTable {
    entries: Vec<RelayTimeout>,
}

impl TimeoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, relay: RelayId, timeout_ms: u64, fatal: bool) -> TimerId {
        self.entries.push(RelayTimeout {
            relay,
            timeout_ms,
            fatal,
            countdown: Countdown::Idle,
        });
        TimerId(self.entries.len() - 1)
    }

    /// Feed a relay transition to one countdown.
    ///
    /// Enabling an Idle countdown arms it; enabling an Armed one is a no-op.
    /// Disabling always returns it to Idle.
    pub fn on_transition(&mut self, id: TimerId, on: bool, now_ms: u64) {
        let Some(entry) = self.entries.get_mut(id.0) else {
            return;
        };
        match (entry.countdown, on) {
            (Countdown::Idle, true) => {
                let deadline_ms = now_ms.saturating_add(entry.timeout_ms);
                debug!("Timeout armed: relay {} until t={deadline_ms}ms", entry.relay);
                entry.countdown = Countdown::Armed { deadline_ms };
            }
            (Countdown::Armed { .. }, false) => {
                debug!("Timeout cancelled: relay {}", entry.relay);
                entry.countdown = Countdown::Idle;
            }
            _ => {}
        }
    }

    /// Return every countdown of `relay` to Idle.
    pub fn cancel_relay(&mut self, relay: RelayId) {
        for entry in self.entries.iter_mut().filter(|e| e.relay == relay) {
            entry.countdown = Countdown::Idle;
        }
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter_map(|e| match e.countdown {
                Countdown::Armed { deadline_ms } => Some(deadline_ms),
                Countdown::Idle => None,
            })
            .min()
    }

    /// Disarm and return the earliest countdown whose deadline is `<= now_ms`.
    /// Ties resolve in registration order.
    pub fn take_due(&mut self, now_ms: u64) -> Option<Expired> {
        let entry = self
            .entries
            .iter_mut()
            .filter_map(|e| match e.countdown {
                Countdown::Armed { deadline_ms } if deadline_ms <= now_ms => Some((deadline_ms, e)),
                _ => None,
            })
            .min_by_key(|(deadline_ms, _)| *deadline_ms)?;
        let (deadline_ms, entry) = entry;
        entry.countdown = Countdown::Idle;
        Some(Expired {
            relay: entry.relay,
            timeout_ms: entry.timeout_ms,
            fatal: entry.fatal,
            deadline_ms,
        })
    }

    pub fn countdown(&self, id: TimerId) -> Option<Countdown> {
        self.entries.get(id.0).map(|e| e.countdown)
    }

    /// True if any countdown of `relay` is running.
    pub fn is_armed(&self, relay: RelayId) -> bool {
        self.entries
            .iter()
            .any(|e| e.relay == relay && matches!(e.countdown, Countdown::Armed { .. }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
