//! fg core: persistent instance registry and process supervisor.
//!
//! Launches installed application versions as detached background processes
//! and tracks them across independent, short-lived invocations of the `fg`
//! tool. The only shared state is a JSON registry document under the fg home,
//! which every operation reconciles against the live OS process table before
//! trusting it.
//!
//! # Example
//!
//! ```rust,ignore
//! use fg_core::{FgPaths, StopOutcome, Supervisor};
//!
//! fn main() -> fg_core::Result<()> {
//!     let supervisor = Supervisor::new(FgPaths::from_env()?)?;
//!
//!     let pid = supervisor.start("1.2.0")?;
//!     for entry in supervisor.status()? {
//!         println!("{} {} {}", entry.pid, entry.version_label, entry.uptime_display);
//!     }
//!     for line in supervisor.tail(pid, 20)? {
//!         println!("{}", line);
//!     }
//!
//!     assert_eq!(supervisor.stop(pid)?, StopOutcome::Stopped);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod install;
pub mod logs;
pub mod platform;
pub mod process;
pub mod registry;
pub mod system;

mod api;

pub use api::FgApi;
pub use error::{FgError, LaunchError, Result};
pub use install::{JdkResolver, LocalVersions, RuntimeResolver, VersionCatalog, VersionManifest};
pub use logs::{LogFollow, LogStream};
pub use platform::FgPaths;
pub use process::{
    LaunchCommand, StatusEntry, StopOutcome, StopTiming, Supervisor, SupervisorBuilder,
    VersionConfig,
};
pub use registry::{IdentityPolicy, InstanceMap, InstanceRecord};
pub use system::{OsProcessTable, ProcessTable};
