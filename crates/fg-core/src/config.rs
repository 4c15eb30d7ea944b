//! Centralized configuration for the fg supervisor.
//!
//! Tunables are plain constants grouped by concern. Embedders that need other
//! values (tests, GUI hosts) override them through [`crate::SupervisorBuilder`].

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "fg";
    /// Environment variable that overrides the per-user root directory.
    pub const HOME_ENV_VAR: &'static str = "FG_HOME";
}

/// Stop/escalation timing.
pub struct SupervisorConfig;

impl SupervisorConfig {
    /// Wait after the graceful termination request before forcing a kill.
    pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);
    /// How often liveness is re-checked during the grace period.
    pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// How long to wait for the process to disappear after a forced kill.
    pub const KILL_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);
    /// Allowed skew between a record's start time and the OS-reported one
    /// when PID identity is verified.
    pub const START_TIME_TOLERANCE: Duration = Duration::from_secs(5);
}

/// Log sink and log reader configuration.
pub struct LogConfig;

impl LogConfig {
    /// Polling interval for live log following.
    pub const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(250);
    pub const DEFAULT_TAIL_LINES: usize = 50;
    pub const STDOUT_EXTENSION: &'static str = "log";
    pub const STDERR_EXTENSION: &'static str = "err";
    /// `{version_label}_{timestamp}` sink stem format.
    pub const SINK_TIMESTAMP_FORMAT: &'static str = "%Y%m%d_%H%M%S";
    /// Give up looking for a free sink name after this many suffixes.
    pub const MAX_SINK_SUFFIX: u32 = 1000;
    /// Lines buffered between a follower and an async consumer.
    pub const FOLLOW_CHANNEL_CAPACITY: usize = 256;
}

/// Status reporting configuration.
pub struct StatusConfig;

impl StatusConfig {
    /// Window between the two process refreshes used to compute CPU usage.
    pub const CPU_SAMPLE_INTERVAL: Duration = sysinfo::MINIMUM_CPU_UPDATE_INTERVAL;
    pub const START_TIME_DISPLAY_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const ROOT_DIR_NAME: &'static str = ".fg";
    pub const VERSIONS_DIR_NAME: &'static str = "versions";
    pub const LOGS_DIR_NAME: &'static str = "logs";
    pub const RUNTIMES_DIR_NAME: &'static str = "jdk";
    pub const LIBS_DIR_NAME: &'static str = "libs";
    pub const REGISTRY_FILENAME: &'static str = "processes.json";
    pub const REGISTRY_LOCK_FILENAME: &'static str = "processes.json.lock";
    pub const MANIFEST_FILENAME: &'static str = "fgmanifest.json";
}
