//! Application core: the bench engine and its boundary.
//!
//! All interaction with hardware, time and logging happens through **port
//! traits** defined in [`ports`], keeping the engine fully testable against
//! the simulated adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
