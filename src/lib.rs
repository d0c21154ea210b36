//! Relaybench library.
//!
//! Safety-constrained control of a fixture's relay bank and power rail.
//! The engine ([`Bench`]) owns the bookkeeping of which relays are enabled,
//! the observer chains attached to every output, and the timeout
//! countdowns.  Hardware, time and event output are reached only through
//! the port traits in [`app::ports`], so everything here runs on the host
//! against the simulated adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod power;
pub mod relays;
pub mod safety;
pub mod scheduler;

pub use app::service::Bench;
pub use error::{Error, ProhibitedState, Result};
pub use power::Voltage;
pub use relays::{RelayBuffer, RelayId, RelaySet};
