//! Instance lifecycle: start, stop, status and log access.
//!
//! All operations hang off [`Supervisor`]; each one reads the reconciled
//! registry first, and the mutating ones (start, stop) finish with a locked
//! read-modify-write of it.

mod command;
mod log_reader;
mod spawner;
mod status;
mod supervisor;
mod terminator;

pub use command::{classpath_entries, LaunchCommand};
pub use status::StatusEntry;
pub use supervisor::{StopTiming, Supervisor, SupervisorBuilder, VersionConfig};
pub use terminator::StopOutcome;
