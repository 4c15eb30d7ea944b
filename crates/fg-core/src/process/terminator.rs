//! Stopping managed instances.

use super::supervisor::Supervisor;
use crate::error::Result;
use crate::platform::{self, TerminationPath};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum StopOutcome {
    /// Terminated, gracefully or by force; the record is gone.
    Stopped,
    /// Not in the reconciled registry. Nothing was signalled.
    NotManaged,
    /// Exited before it could be signalled; the record is gone.
    AlreadyDead,
    /// The OS refused the signal. The record is kept.
    Failed(String),
}

impl StopOutcome {
    /// Whether the process is known not to be running any more.
    pub fn is_success(&self) -> bool {
        matches!(self, StopOutcome::Stopped | StopOutcome::AlreadyDead)
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Stopped => write!(f, "stopped"),
            StopOutcome::NotManaged => write!(f, "not managed"),
            StopOutcome::AlreadyDead => write!(f, "already exited"),
            StopOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl Supervisor {
    /// Stop a managed instance: graceful request, forced kill once the grace
    /// period runs out, then unregister.
    ///
    /// Blocks for at most the grace period plus the kill settle window.
    /// Registry I/O failures are errors; signal failures are
    /// [`StopOutcome::Failed`].
    pub fn stop(&self, pid: u32) -> Result<StopOutcome> {
        let instances = self.store.read(&self.reconciler)?;
        let Some(record) = instances.get(&pid) else {
            info!("PID {} is not a managed instance", pid);
            return Ok(StopOutcome::NotManaged);
        };

        info!("Stopping {} (PID {})", record.version_label, pid);
        let table = self.reconciler.process_table().clone();
        let timing = self.stop_timing;
        let path = match platform::terminate_with_grace(
            pid,
            timing.grace_period,
            timing.poll_interval,
            timing.settle_timeout,
            &|p| table.is_alive(p),
        ) {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to stop PID {}: {}", pid, e);
                return Ok(StopOutcome::Failed(e.to_string()));
            }
        };

        self.unregister(pid)?;

        Ok(match path {
            TerminationPath::Graceful => {
                info!("PID {} stopped", pid);
                StopOutcome::Stopped
            }
            TerminationPath::Forced => {
                warn!(
                    "PID {} ignored the stop request for {:?} and was killed",
                    pid, timing.grace_period
                );
                StopOutcome::Stopped
            }
            TerminationPath::AlreadyGone => {
                info!("PID {} had already exited", pid);
                StopOutcome::AlreadyDead
            }
        })
    }

    /// Stop every managed instance of `label`.
    pub fn stop_version(&self, label: &str) -> Result<Vec<(u32, StopOutcome)>> {
        let pids: Vec<u32> = self
            .store
            .read(&self.reconciler)?
            .into_iter()
            .filter(|(_, record)| record.version_label == label)
            .map(|(pid, _)| pid)
            .collect();
        self.stop_each(pids)
    }

    /// Stop every managed instance.
    pub fn stop_all(&self) -> Result<Vec<(u32, StopOutcome)>> {
        let pids: Vec<u32> = self.store.read(&self.reconciler)?.into_keys().collect();
        self.stop_each(pids)
    }

    fn stop_each(&self, pids: Vec<u32>) -> Result<Vec<(u32, StopOutcome)>> {
        pids.into_iter()
            .map(|pid| Ok((pid, self.stop(pid)?)))
            .collect()
    }

    /// Drop `pid` from the registry. Removing an absent record is a no-op.
    fn unregister(&self, pid: u32) -> Result<()> {
        self.store.update(&self.reconciler, |map| {
            map.remove(&pid);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FgPaths;
    use crate::registry::{FakeTable, InstanceRecord};
    use std::time::Duration;
    use tempfile::TempDir;

    const MISSING_PID: u32 = 999_999_999;

    fn supervisor(temp_dir: &TempDir, table: std::sync::Arc<FakeTable>) -> Supervisor {
        Supervisor::builder(FgPaths::new(temp_dir.path()))
            .process_table(table)
            .grace_period(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    fn register(supervisor: &Supervisor, pid: u32, label: &str) {
        let record = InstanceRecord::new(label, 0.0, "x.log", "x.err");
        supervisor
            .store
            .update(&supervisor.reconciler, |map| map.insert(pid, record))
            .unwrap();
    }

    #[test]
    fn test_unknown_pid_is_not_managed() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = supervisor(&temp_dir, FakeTable::with(&[]));

        assert_eq!(supervisor.stop(4242).unwrap(), StopOutcome::NotManaged);
    }

    #[test]
    fn test_dead_record_is_not_managed() {
        let temp_dir = TempDir::new().unwrap();
        let table = FakeTable::with(&[(MISSING_PID, 0)]);
        let supervisor = supervisor(&temp_dir, table.clone());
        register(&supervisor, MISSING_PID, "1.0.0");

        table.kill(MISSING_PID);
        assert_eq!(supervisor.stop(MISSING_PID).unwrap(), StopOutcome::NotManaged);
    }

    #[test]
    fn test_vanished_at_signal_time_is_already_dead() {
        let temp_dir = TempDir::new().unwrap();
        // The table still believes in the PID, but the OS has no such process.
        let table = FakeTable::with(&[(MISSING_PID, 0)]);
        let supervisor = supervisor(&temp_dir, table);
        register(&supervisor, MISSING_PID, "1.0.0");

        assert_eq!(supervisor.stop(MISSING_PID).unwrap(), StopOutcome::AlreadyDead);
        assert!(supervisor.store.load().unwrap().is_empty());
    }

    #[test]
    fn test_stop_version_only_touches_that_version() {
        let temp_dir = TempDir::new().unwrap();
        let table = FakeTable::with(&[(MISSING_PID, 0), (MISSING_PID - 1, 0)]);
        let supervisor = supervisor(&temp_dir, table);
        register(&supervisor, MISSING_PID, "1.0.0");
        register(&supervisor, MISSING_PID - 1, "2.0.0");

        let outcomes = supervisor.stop_version("1.0.0").unwrap();
        assert_eq!(outcomes, vec![(MISSING_PID, StopOutcome::AlreadyDead)]);
        assert_eq!(
            supervisor.store.load().unwrap().keys().copied().collect::<Vec<_>>(),
            vec![MISSING_PID - 1]
        );

        let outcomes = supervisor.stop_all().unwrap();
        assert_eq!(outcomes, vec![(MISSING_PID - 1, StopOutcome::AlreadyDead)]);
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_live_child() {
        use crate::system::OsProcessTable;

        let temp_dir = TempDir::new().unwrap();
        let supervisor = Supervisor::builder(FgPaths::new(temp_dir.path()))
            .process_table(std::sync::Arc::new(OsProcessTable::new()))
            .grace_period(Duration::from_secs(2))
            .build()
            .unwrap();

        let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        register(&supervisor, pid, "1.0.0");

        assert_eq!(supervisor.stop(pid).unwrap(), StopOutcome::Stopped);
        assert!(supervisor.instances().unwrap().is_empty());
        assert_eq!(supervisor.stop(pid).unwrap(), StopOutcome::NotManaged);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(StopOutcome::Stopped.to_string(), "stopped");
        assert_eq!(
            StopOutcome::Failed("EPERM".into()).to_string(),
            "failed: EPERM"
        );
        assert!(StopOutcome::AlreadyDead.is_success());
        assert!(!StopOutcome::NotManaged.is_success());
    }
}
