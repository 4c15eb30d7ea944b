//! Persistent instance registry.
//!
//! The registry is the only state shared between fg invocations: a JSON
//! document mapping PIDs (as strings) to [`InstanceRecord`]s. Every read is
//! reconciled against the live process table, and every write is a locked
//! read-modify-write of the whole document.

mod atomic;
mod reconcile;
mod record;
mod store;

pub use reconcile::{IdentityPolicy, Reconciler};
pub use record::{format_elapsed, InstanceMap, InstanceRecord};
pub use store::{RegistryLock, RegistryStore};

#[cfg(test)]
pub(crate) use reconcile::tests::FakeTable;
