//! The supervisor façade and its builder.

use crate::config::{LogConfig, PathsConfig, StatusConfig, SupervisorConfig};
use crate::error::{FgError, Result};
use crate::install::{
    latest_installed, JdkResolver, LocalVersions, RuntimeResolver, VersionCatalog,
    VersionManifest,
};
use crate::platform::FgPaths;
use crate::registry::{IdentityPolicy, InstanceMap, Reconciler, RegistryStore};
use crate::system::{OsProcessTable, ProcessTable, ResourceTracker};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Stop-path timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTiming {
    /// Wait after the graceful request before forcing.
    pub grace_period: Duration,
    /// Liveness probe interval while waiting.
    pub poll_interval: Duration,
    /// Wait after the forced kill for the process to disappear.
    pub settle_timeout: Duration,
}

impl Default for StopTiming {
    fn default() -> Self {
        Self {
            grace_period: SupervisorConfig::STOP_GRACE_PERIOD,
            poll_interval: SupervisorConfig::STOP_POLL_INTERVAL,
            settle_timeout: SupervisorConfig::KILL_SETTLE_TIMEOUT,
        }
    }
}

/// Manifest of one installed version plus what is missing from its `libs/`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionConfig {
    pub label: String,
    pub version_dir: PathBuf,
    pub manifest: VersionManifest,
    /// Jar names of declared dependencies not found in `libs/`.
    pub missing_dependencies: Vec<String>,
}

/// Starts, stops, inspects and tails instances of installed versions.
///
/// Holds no instance state of its own: every call goes through the registry
/// document, so any number of supervisors (in one process or many) can share
/// one fg home.
pub struct Supervisor {
    pub(crate) paths: FgPaths,
    pub(crate) store: RegistryStore,
    pub(crate) reconciler: Reconciler,
    pub(crate) catalog: Arc<dyn VersionCatalog>,
    pub(crate) runtime: Arc<dyn RuntimeResolver>,
    pub(crate) resources: ResourceTracker,
    pub(crate) stop_timing: StopTiming,
    pub(crate) follow_interval: Duration,
}

impl Supervisor {
    /// Supervisor with default collaborators rooted at `paths`.
    pub fn new(paths: FgPaths) -> Result<Self> {
        Self::builder(paths).build()
    }

    /// Supervisor rooted at `$FG_HOME` or `~/.fg`.
    pub fn from_env() -> Result<Self> {
        Self::new(FgPaths::from_env()?)
    }

    pub fn builder(paths: FgPaths) -> SupervisorBuilder {
        SupervisorBuilder::new(paths)
    }

    pub fn paths(&self) -> &FgPaths {
        &self.paths
    }

    pub fn identity_policy(&self) -> IdentityPolicy {
        self.reconciler.policy()
    }

    /// Reconciled view of every managed instance.
    pub fn instances(&self) -> Result<InstanceMap> {
        self.store.read(&self.reconciler)
    }

    pub fn installed_versions(&self) -> Result<Vec<String>> {
        self.catalog.installed_versions()
    }

    /// Highest installed version label.
    pub fn latest_version(&self) -> Result<Option<String>> {
        latest_installed(self.catalog.as_ref())
    }
    pub fn version_config(&self, label: &str) -> Result<VersionConfig> {
        if !self.catalog.is_version_installed(label) {
            return Err(FgError::not_installed(label));
        }
        let manifest = self.catalog.get_manifest(label)?;
        let version_dir = self.catalog.version_dir(label);
        let missing_dependencies = manifest
            .missing_dependencies(&version_dir.join(PathsConfig::LIBS_DIR_NAME))
            .into_iter()
            .map(|dep| dep.jar_name())
            .collect();

        Ok(VersionConfig {
            label: label.to_string(),
            version_dir,
            manifest,
            missing_dependencies,
        })
    }
}

/// Builder for [`Supervisor`].
///
/// # Example
///
/// ```rust,ignore
/// use fg_core::{FgPaths, IdentityPolicy, Supervisor};
/// use std::time::Duration;
///
/// let supervisor = Supervisor::builder(FgPaths::from_env()?)
///     .grace_period(Duration::from_secs(10))
///     .identity_policy(IdentityPolicy::verify_start_time())
///     .build()?;
/// ```
pub struct SupervisorBuilder {
    paths: FgPaths,
    catalog: Option<Arc<dyn VersionCatalog>>,
    runtime: Option<Arc<dyn RuntimeResolver>>,
    process_table: Option<Arc<dyn ProcessTable>>,
    identity_policy: IdentityPolicy,
    stop_timing: StopTiming,
    follow_interval: Duration,
    cpu_sample_interval: Duration,
    create_dirs: bool,
}

impl SupervisorBuilder {
    pub fn new(paths: FgPaths) -> Self {
        Self {
            paths,
            catalog: None,
            runtime: None,
            process_table: None,
            identity_policy: IdentityPolicy::default(),
            stop_timing: StopTiming::default(),
            follow_interval: LogConfig::FOLLOW_POLL_INTERVAL,
            cpu_sample_interval: StatusConfig::CPU_SAMPLE_INTERVAL,
            create_dirs: true,
        }
    }

    /// Replace the installed-version catalog.
    ///
    /// Default: [`LocalVersions`] over `{root}/versions`
    pub fn catalog(mut self, catalog: Arc<dyn VersionCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Replace the runtime resolver.
    ///
    /// Default: [`JdkResolver`] over `{root}/jdk`
    pub fn runtime(mut self, runtime: Arc<dyn RuntimeResolver>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replace the process table used for reconciliation and stop waits.
    pub fn process_table(mut self, table: Arc<dyn ProcessTable>) -> Self {
        self.process_table = Some(table);
        self
    }

    pub fn identity_policy(mut self, policy: IdentityPolicy) -> Self {
        self.identity_policy = policy;
        self
    }

    /// Default: 5 seconds
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.stop_timing.grace_period = grace;
        self
    }

    pub fn stop_timing(mut self, timing: StopTiming) -> Self {
        self.stop_timing = timing;
        self
    }

    /// Default: 250 ms
    pub fn follow_interval(mut self, interval: Duration) -> Self {
        self.follow_interval = interval;
        self
    }

    pub fn cpu_sample_interval(mut self, interval: Duration) -> Self {
        self.cpu_sample_interval = interval;
        self
    }

    /// Create the fg home directories on build.
    ///
    /// Default: `true`
    pub fn create_dirs(mut self, enable: bool) -> Self {
        self.create_dirs = enable;
        self
    }

    pub fn build(self) -> Result<Supervisor> {
        if self.create_dirs {
            self.paths.ensure_dirs()?;
        }

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(LocalVersions::new(self.paths.versions_dir())));
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(JdkResolver::new(self.paths.runtimes_dir())));
        let table = self
            .process_table
            .unwrap_or_else(|| Arc::new(OsProcessTable::new()));

        Ok(Supervisor {
            store: RegistryStore::from_paths(&self.paths),
            reconciler: Reconciler::new(table, self.identity_policy),
            catalog,
            runtime,
            resources: ResourceTracker::new(self.cpu_sample_interval),
            stop_timing: self.stop_timing,
            follow_interval: self.follow_interval,
            paths: self.paths,
        })
    }
}
