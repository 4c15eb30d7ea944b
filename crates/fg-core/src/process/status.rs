//! Status of managed instances.

use super::supervisor::Supervisor;
use crate::error::Result;
use crate::registry::format_elapsed;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One live instance with point-in-time resource usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub pid: u32,
    pub version_label: String,
    pub running: bool,
    /// Spawn time, seconds since the Unix epoch.
    pub start_time: f64,
    /// Spawn time in local time, `%Y-%m-%d %H:%M:%S`.
    pub started_at: String,
    pub uptime: Duration,
    /// Uptime rendered as `1d 02h 03m 04s`.
    pub uptime_display: String,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub stdout_sink: PathBuf,
    pub stderr_sink: PathBuf,
}

impl Supervisor {
    /// Every live managed instance, with CPU and memory usage.
    ///
    /// Blocks for the CPU sampling window. Instances that exit while being
    /// sampled are left out.
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let instances = self.store.read(&self.reconciler)?;
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        let pids: Vec<u32> = instances.keys().copied().collect();
        let usage = self.resources.sample(&pids);
        let now = Utc::now();

        Ok(instances
            .into_iter()
            .filter_map(|(pid, record)| {
                let resources = usage.get(&pid)?;
                let uptime = record.elapsed(now);
                Some(StatusEntry {
                    pid,
                    started_at: record.started_at_display(),
                    uptime_display: format_elapsed(uptime),
                    uptime,
                    running: true,
                    start_time: record.start_time,
                    cpu_percent: resources.cpu_percent,
                    memory_mb: resources.memory_mb(),
                    version_label: record.version_label,
                    stdout_sink: record.stdout_sink,
                    stderr_sink: record.stderr_sink,
                })
            })
            .collect())
    }
}
