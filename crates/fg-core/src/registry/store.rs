//! Durable registry document with cross-process locking.
//!
//! The registry is shared by independent, short-lived invocations, so an
//! in-memory lock is useless. Every read-modify-write holds an exclusive
//! advisory lock on a sidecar file for its whole duration, and every write
//! replaces the document atomically. Plain reads take no lock: the rename
//! guarantees they see a complete document.

use super::atomic::{read_json, write_json_atomic, JsonDocument};
use super::reconcile::Reconciler;
use super::record::InstanceMap;
use crate::error::{FgError, Result};
use crate::platform::FgPaths;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive hold on the registry; released on drop.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

/// The on-disk registry document.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
        }
    }

    pub fn from_paths(paths: &FgPaths) -> Self {
        Self::new(paths.registry_path(), paths.registry_lock_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the raw mapping without reconciliation.
    ///
    /// A missing document is an empty registry. A malformed one is reported
    /// with a warning and also treated as empty; only I/O failures are errors.
    pub fn load(&self) -> Result<InstanceMap> {
        self.load_inner(false)
    }

    fn load_inner(&self, quarantine: bool) -> Result<InstanceMap> {
        match read_json::<InstanceMap>(&self.path)? {
            JsonDocument::Parsed(map) => Ok(map),
            JsonDocument::Missing | JsonDocument::Empty => Ok(InstanceMap::new()),
            JsonDocument::Malformed(e) => {
                let err = FgError::RegistryCorrupt {
                    path: self.path.clone(),
                    message: e.to_string(),
                };
                warn!("{}; continuing with an empty registry", err);
                if quarantine {
                    self.quarantine();
                }
                Ok(InstanceMap::new())
            }
        }
    }

    /// Move a malformed document aside so it can be inspected later.
    ///
    /// Only called with the lock held, otherwise a concurrent writer's fresh
    /// document could be the one moved.
    fn quarantine(&self) {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let mut target = self.path.clone().into_os_string();
        target.push(format!(".corrupt-{}", stamp));
        let target = PathBuf::from(target);

        match fs::rename(&self.path, &target) {
            Ok(()) => warn!("Quarantined malformed registry to {}", target.display()),
            Err(e) => warn!("Failed to quarantine {}: {}", self.path.display(), e),
        }
    }

    /// Overwrite the document with `map`.
    pub fn save(&self, map: &InstanceMap) -> Result<()> {
        write_json_atomic(&self.path, map)
    }

    /// Block until this invocation holds the registry exclusively.
    pub fn lock(&self) -> Result<RegistryLock> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| FgError::io_with_path(e, parent))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| FgError::RegistryLock {
                path: self.lock_path.clone(),
                source: e,
            })?;

        FileExt::lock_exclusive(&file).map_err(|e| FgError::RegistryLock {
            path: self.lock_path.clone(),
            source: e,
        })?;

        debug!("Acquired registry lock {}", self.lock_path.display());
        Ok(RegistryLock {
            file,
            path: self.lock_path.clone(),
        })
    }

    /// Load and reconcile. Callers never see records for dead processes.
    pub fn read(&self, reconciler: &Reconciler) -> Result<InstanceMap> {
        Ok(reconciler.reconcile(self.load()?))
    }

    /// Locked load, reconcile, modify, save.
    ///
    /// The reconciled mapping is always written back, so pruned records are
    /// persisted even when `f` changes nothing.
    pub fn update<T>(
        &self,
        reconciler: &Reconciler,
        f: impl FnOnce(&mut InstanceMap) -> T,
    ) -> Result<T> {
        let _lock = self.lock()?;
        let mut map = reconciler.reconcile(self.load_inner(true)?);
        let out = f(&mut map);
        self.save(&map)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::reconcile::tests::FakeTable;
    use super::super::reconcile::IdentityPolicy;
    use super::super::record::InstanceRecord;
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> RegistryStore {
        RegistryStore::from_paths(&FgPaths::new(dir.path()))
    }

    fn record(label: &str) -> InstanceRecord {
        InstanceRecord::new(
            label,
            1_714_567_890.5,
            format!("/logs/{}.log", label),
            format!("/logs/{}.err", label),
        )
    }

    #[test]
    fn test_missing_document_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(store_in(&temp_dir).load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let mut map = InstanceMap::new();
        map.insert(101, record("1.0.0"));
        map.insert(202, record("1.2.0"));

        store.save(&map).unwrap();
        assert_eq!(store.load().unwrap(), map);

        // Saving what was loaded changes nothing.
        store.save(&store.load().unwrap()).unwrap();
        assert_eq!(store.load().unwrap(), map);
    }

    #[test]
    fn test_malformed_document_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().unwrap().is_empty());
        // Plain reads never move the document.
        assert!(store.path().exists());
    }

    #[test]
    fn test_unexpected_shape_is_quarantined_on_update() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::write(store.path(), r#"{"12": {"version": "1.0.0"}}"#).unwrap();

        let reconciler = Reconciler::new(FakeTable::with(&[]), IdentityPolicy::PidOnly);
        store.update(&reconciler, |_| ()).unwrap();

        let quarantined: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(quarantined.len(), 1);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_update_persists_pruned_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let table = FakeTable::with(&[(101, 0)]);
        let reconciler = Reconciler::new(table.clone(), IdentityPolicy::PidOnly);

        let mut map = InstanceMap::new();
        map.insert(101, record("1.0.0"));
        map.insert(202, record("1.2.0"));
        store.save(&map).unwrap();

        // Reads reconcile but do not write back.
        assert_eq!(store.read(&reconciler).unwrap().len(), 1);
        assert_eq!(store.load().unwrap().len(), 2);

        store
            .update(&reconciler, |live| live.insert(303, record("2.0.0")))
            .unwrap();
        let on_disk = store.load().unwrap();
        assert_eq!(on_disk.keys().copied().collect::<Vec<_>>(), vec![101, 303]);

        table.kill(101);
        assert_eq!(
            store.read(&reconciler).unwrap().keys().copied().collect::<Vec<_>>(),
            vec![303]
        );
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let live: Vec<(u32, u64)> = (1..=16).map(|pid| (pid, 0)).collect();
        let reconciler = Reconciler::new(FakeTable::with(&live), IdentityPolicy::PidOnly);

        std::thread::scope(|scope| {
            for pid in 1..=16u32 {
                let store = store.clone();
                let reconciler = reconciler.clone();
                scope.spawn(move || {
                    store
                        .update(&reconciler, |map| {
                            map.insert(pid, record(&format!("1.{}.0", pid)))
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(store.load().unwrap().len(), 16);
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        drop(store.lock().unwrap());
        let _again = store.lock().unwrap();
    }
}
