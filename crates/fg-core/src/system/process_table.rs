//! Live OS process table, as seen by the reconciler and the stop path.

use crate::platform;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// Read-only view of the OS process table.
///
/// The supervisor only ever asks two questions about a PID, so tests can swap
/// in a scripted table without spawning anything.
pub trait ProcessTable: Send + Sync {
    /// Whether `pid` names a running (non-zombie) process.
    fn is_alive(&self, pid: u32) -> bool;

    /// OS-reported start time of `pid`, in seconds since the Unix epoch.
    fn started_at(&self, pid: u32) -> Option<u64>;
}

/// [`ProcessTable`] backed by signal probes and `sysinfo`.
pub struct OsProcessTable {
    system: Mutex<System>,
}

impl OsProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Refresh a single PID and run `f` against what sysinfo sees.
    fn with_process<T>(&self, pid: u32, f: impl FnOnce(Option<&sysinfo::Process>) -> T) -> T {
        let sys_pid = Pid::from_u32(pid);
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::new(),
        );
        f(system.process(sys_pid))
    }
}

impl Default for OsProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for OsProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        if !platform::is_process_alive(pid) {
            return false;
        }
        // The signal probe also succeeds for zombies; sysinfo can tell them apart.
        self.with_process(pid, |process| match process {
            Some(p) => !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
            None => true,
        })
    }

    fn started_at(&self, pid: u32) -> Option<u64> {
        self.with_process(pid, |process| process.map(|p| p.start_time()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_is_alive() {
        let table = OsProcessTable::new();
        assert!(table.is_alive(std::process::id()));
    }

    #[test]
    fn test_missing_pid_is_dead() {
        let table = OsProcessTable::new();
        assert!(!table.is_alive(999_999_999));
        assert!(table.started_at(999_999_999).is_none());
    }

    #[test]
    fn test_self_start_time_is_in_the_past() {
        let table = OsProcessTable::new();
        let started = table.started_at(std::process::id()).unwrap();
        let now = chrono::Utc::now().timestamp() as u64;
        assert!(started <= now);
        assert!(started > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();

        // Let it exit without reaping; it lingers as a zombie.
        std::thread::sleep(std::time::Duration::from_millis(300));
        let table = OsProcessTable::new();
        assert!(!table.is_alive(pid));

        child.wait().unwrap();
    }
}
