//! Installed versions and runtimes, as seen by the supervisor.
//!
//! Downloading and unpacking live outside this crate; these types only read
//! what an installer left on disk.

mod catalog;
mod manifest;
mod runtime;

pub use catalog::{compare_labels, latest_installed, LocalVersions, VersionCatalog};
pub use manifest::{Dependency, RuntimeRequirement, VersionManifest};
pub use runtime::{JdkResolver, RuntimeResolver};
