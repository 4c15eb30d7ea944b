//! Reconciliation of registry records against the live process table.

use super::record::{InstanceMap, InstanceRecord};
use crate::config::SupervisorConfig;
use crate::system::ProcessTable;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How strictly a live PID must match a record before it counts as ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityPolicy {
    /// Any live process with the recorded PID is trusted.
    #[default]
    PidOnly,
    /// The live process must also have started within `tolerance` of the
    /// record's `start_time`, so a recycled PID is pruned instead of trusted.
    StartTime { tolerance: Duration },
}

impl IdentityPolicy {
    /// `StartTime` with the default tolerance.
    pub fn verify_start_time() -> Self {
        IdentityPolicy::StartTime {
            tolerance: SupervisorConfig::START_TIME_TOLERANCE,
        }
    }
}

/// Drops records whose process is gone (or, under a strict policy, replaced).
#[derive(Clone)]
pub struct Reconciler {
    table: Arc<dyn ProcessTable>,
    policy: IdentityPolicy,
}

impl Reconciler {
    pub fn new(table: Arc<dyn ProcessTable>, policy: IdentityPolicy) -> Self {
        Self { table, policy }
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    pub fn process_table(&self) -> &Arc<dyn ProcessTable> {
        &self.table
    }

    /// Whether `pid` is alive and, per policy, still the process we spawned.
    pub fn is_ours(&self, pid: u32, record: &InstanceRecord) -> bool {
        if !self.table.is_alive(pid) {
            debug!("Pruning PID {} ({}): process gone", pid, record.version_label);
            return false;
        }

        match self.policy {
            IdentityPolicy::PidOnly => true,
            IdentityPolicy::StartTime { tolerance } => match self.table.started_at(pid) {
                Some(started) => {
                    let skew = (started as f64 - record.start_time).abs();
                    let matches = skew <= tolerance.as_secs_f64();
                    if !matches {
                        debug!(
                            "Pruning PID {} ({}): start time differs by {:.0}s, PID reused",
                            pid, record.version_label, skew
                        );
                    }
                    matches
                }
                // Vanished between the two probes.
                None => false,
            },
        }
    }

    /// Keep only the records whose process is still ours.
    pub fn reconcile(&self, map: InstanceMap) -> InstanceMap {
        map.into_iter()
            .filter(|(pid, record)| self.is_ours(*pid, record))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted process table: PID to start time.
    #[derive(Default)]
    pub(crate) struct FakeTable {
        pub(crate) live: Mutex<HashMap<u32, u64>>,
    }

    impl FakeTable {
        pub(crate) fn with(live: &[(u32, u64)]) -> Arc<Self> {
            Arc::new(Self {
                live: Mutex::new(live.iter().copied().collect()),
            })
        }

        pub(crate) fn kill(&self, pid: u32) {
            self.live.lock().unwrap().remove(&pid);
        }
    }

    impl ProcessTable for FakeTable {
        fn is_alive(&self, pid: u32) -> bool {
            self.live.lock().unwrap().contains_key(&pid)
        }

        fn started_at(&self, pid: u32) -> Option<u64> {
            self.live.lock().unwrap().get(&pid).copied()
        }
    }

    fn record(label: &str, start_time: f64) -> InstanceRecord {
        InstanceRecord::new(label, start_time, "x.log", "x.err")
    }

    #[test]
    fn test_prunes_dead_keeps_live() {
        let table = FakeTable::with(&[(10, 1_000), (30, 3_000)]);
        let reconciler = Reconciler::new(table, IdentityPolicy::PidOnly);

        let mut map = InstanceMap::new();
        map.insert(10, record("1.0.0", 1_000.0));
        map.insert(20, record("1.1.0", 2_000.0));
        map.insert(30, record("1.2.0", 3_000.0));

        let live = reconciler.reconcile(map);
        assert_eq!(live.keys().copied().collect::<Vec<_>>(), vec![10, 30]);
    }

    #[test]
    fn test_pid_only_trusts_reused_pid() {
        let table = FakeTable::with(&[(10, 9_999)]);
        let reconciler = Reconciler::new(table, IdentityPolicy::PidOnly);
        assert!(reconciler.is_ours(10, &record("1.0.0", 1_000.0)));
    }

    #[test]
    fn test_start_time_policy_rejects_reused_pid() {
        let table = FakeTable::with(&[(10, 9_999), (11, 1_002)]);
        let reconciler = Reconciler::new(table, IdentityPolicy::verify_start_time());

        assert!(!reconciler.is_ours(10, &record("1.0.0", 1_000.0)));
        assert!(reconciler.is_ours(11, &record("1.0.0", 1_000.4)));
    }

    #[test]
    fn test_reconcile_empty() {
        let reconciler = Reconciler::new(FakeTable::with(&[]), IdentityPolicy::default());
        assert!(reconciler.reconcile(InstanceMap::new()).is_empty());
    }
}
