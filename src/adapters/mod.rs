//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements  | Connects to                     |
//! |---------------|-------------|---------------------------------|
//! | `config_file` | ConfigPort  | JSON fixture description        |
//! | `gpio`        | OutputPort  | `embedded-hal` output pins      |
//! | `log_sink`    | EventSink   | `log` facade                    |
//! | `sim`         | OutputPort  | In-memory DAQ with panel access |
//! | `time`        | Clock       | `std::time` / virtual time      |

pub mod config_file;
pub mod gpio;
pub mod log_sink;
pub mod sim;
pub mod time;
