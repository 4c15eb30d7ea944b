//! Per-process resource sampling.
//!
//! CPU usage is a rate, so sysinfo needs two refreshes some time apart; a
//! single `sample` call pays that window once for all requested PIDs.

use crate::config::StatusConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Point-in-time resource usage of one process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResources {
    /// CPU usage percentage (0-100+, can exceed 100 on multi-core).
    pub cpu_percent: f32,
    /// Resident memory in bytes.
    pub memory_bytes: u64,
}

impl ProcessResources {
    /// Resident memory in MiB, rounded to one decimal.
    pub fn memory_mb(&self) -> f64 {
        ((self.memory_bytes as f64 / (1024.0 * 1024.0)) * 10.0).round() / 10.0
    }
}

/// Resource tracker for managed processes.
pub struct ResourceTracker {
    /// Window between the two CPU refreshes.
    sample_interval: Duration,
    /// System info instance.
    system: Mutex<System>,
}

impl ResourceTracker {
    /// Create a new resource tracker.
    ///
    /// # Arguments
    ///
    /// * `sample_interval` - How long to measure CPU usage over
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            sample_interval,
            system: Mutex::new(System::new()),
        }
    }

    /// Sample CPU and memory for each PID.
    ///
    /// PIDs that vanish before or during sampling are simply absent from the
    /// returned map.
    pub fn sample(&self, pids: &[u32]) -> HashMap<u32, ProcessResources> {
        if pids.is_empty() {
            return HashMap::new();
        }

        let sys_pids: Vec<Pid> = pids.iter().map(|&pid| Pid::from_u32(pid)).collect();
        let refresh_kind = ProcessRefreshKind::new().with_cpu().with_memory();

        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&sys_pids),
            true,
            refresh_kind,
        );
        std::thread::sleep(self.sample_interval);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&sys_pids),
            true,
            refresh_kind,
        );

        sys_pids
            .iter()
            .filter_map(|sys_pid| {
                let process = system.process(*sys_pid)?;
                Some((
                    sys_pid.as_u32(),
                    ProcessResources {
                        cpu_percent: (process.cpu_usage() * 10.0).round() / 10.0,
                        memory_bytes: process.memory(),
                    },
                ))
            })
            .collect()
    }
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new(StatusConfig::CPU_SAMPLE_INTERVAL)
    }
}
