//! OS process-table queries: liveness, identity and resource usage.

mod process_table;
mod resources;

pub use process_table::{OsProcessTable, ProcessTable};
pub use resources::{ProcessResources, ResourceTracker};
