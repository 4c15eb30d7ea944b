//! Platform abstraction layer for cross-platform compatibility.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered through the supervisor:
//! - `paths` - per-user directory layout
//! - `process` - liveness probes, detachment, signals and termination escalation

pub mod paths;
pub mod process;

pub use paths::FgPaths;
pub use process::{
    detach, is_process_alive, send_signal, terminate_with_grace, SignalDelivery,
    TerminationPath, TerminationSignal,
};
