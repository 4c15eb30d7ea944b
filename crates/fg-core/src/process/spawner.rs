//! Launching versions as detached, registered instances.

use super::command::LaunchCommand;
use super::supervisor::Supervisor;
use crate::config::LogConfig;
use crate::error::{FgError, LaunchError, Result};
use crate::logs::LogStream;
use crate::platform;
use crate::registry::InstanceRecord;
use chrono::{DateTime, Local, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::thread;
use tracing::{debug, error, info, warn};

/// Freshly created stdout/stderr sinks for one spawn.
#[derive(Debug)]
pub(crate) struct Sinks {
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub stdout: File,
    pub stderr: File,
}

impl Sinks {
    /// Create `{label}_{timestamp}.log` and `.err` in `logs_dir`.
    ///
    /// Both files are created exclusively; a name already taken within the
    /// same second gets a `_N` suffix instead of being reused.
    pub(crate) fn create(logs_dir: &Path, label: &str, now: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(logs_dir).map_err(|e| FgError::io_with_path(e, logs_dir))?;
        let stamp = now.format(LogConfig::SINK_TIMESTAMP_FORMAT).to_string();

        for attempt in 0..LogConfig::MAX_SINK_SUFFIX {
            let base = if attempt == 0 {
                format!("{}_{}", label, stamp)
            } else {
                format!("{}_{}_{}", label, stamp, attempt)
            };
            let sink_path =
                |stream: LogStream| logs_dir.join(format!("{}.{}", base, stream.extension()));
            let stdout_path = sink_path(LogStream::Stdout);
            let stderr_path = sink_path(LogStream::Stderr);

            let stdout = match create_sink(&stdout_path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(FgError::io_with_path(e, stdout_path)),
            };
            let stderr = match create_sink(&stderr_path) {
                Ok(file) => file,
                Err(e) => {
                    drop(stdout);
                    let _ = fs::remove_file(&stdout_path);
                    if e.kind() == ErrorKind::AlreadyExists {
                        continue;
                    }
                    return Err(FgError::io_with_path(e, stderr_path));
                }
            };

            return Ok(Self {
                stdout_path,
                stderr_path,
                stdout,
                stderr,
            });
        }

        Err(FgError::Other(format!(
            "No free log file name for {} at {}",
            label, stamp
        )))
    }
}

fn create_sink(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().append(true).create_new(true).open(path)
}

/// Remove sinks that were never written to.
fn discard_sinks(paths: [&Path; 2]) {
    for path in paths {
        let empty = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false);
        if empty {
            if let Err(e) = fs::remove_file(path) {
                debug!("Could not remove unused sink {}: {}", path.display(), e);
            }
        }
    }
}

/// Wait on the child in the background so it never lingers as a zombie of
/// a long-lived host.
fn spawn_reaper(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("fg-reaper-{}", pid))
        .spawn(move || match child.wait() {
            Ok(status) => debug!("Instance {} exited with {}", pid, status),
            Err(e) => debug!("Instance {} already reaped: {}", pid, e),
        });
    if let Err(e) = spawned {
        warn!("Failed to start reaper for PID {}: {}", pid, e);
    }
}

impl Supervisor {
    /// Launch `label` detached and register it. Returns the new PID.
    ///
    /// No record is written unless the process actually started, and a
    /// started process is never left running without a record.
    pub fn start(&self, label: &str) -> Result<u32> {
        if !self.catalog.is_version_installed(label) {
            return Err(FgError::not_installed(label));
        }
        let manifest = self.catalog.get_manifest(label)?;
        let version_dir = self.catalog.version_dir(label);
        let launch = LaunchCommand::build(label, &manifest, &version_dir, self.runtime.as_ref())?;

        let sinks = Sinks::create(&self.paths.logs_dir(), label, Local::now())?;
        let Sinks {
            stdout_path,
            stderr_path,
            stdout,
            stderr,
        } = sinks;

        let mut cmd = launch.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        platform::detach(&mut cmd);

        debug!("Launching {}: {}", label, launch);
        let spawned = cmd.spawn();
        // Releases our copies of the sink handles before any cleanup.
        drop(cmd);
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {}: {}", label, e);
                discard_sinks([stdout_path.as_path(), stderr_path.as_path()]);
                return Err(LaunchError::SpawnFailed {
                    label: label.to_string(),
                    source: e,
                }
                .into());
            }
        };

        let pid = child.id();
        let start_time = Utc::now().timestamp_millis() as f64 / 1000.0;
        let record = InstanceRecord::new(label, start_time, &stdout_path, &stderr_path);

        if let Err(e) = self
            .store
            .update(&self.reconciler, |map| map.insert(pid, record))
        {
            error!(
                "Failed to register PID {} ({}), killing it: {}",
                pid, label, e
            );
            if let Err(kill_err) = child.kill() {
                warn!("Failed to kill unregistered PID {}: {}", pid, kill_err);
            }
            let _ = child.wait();
            return Err(e);
        }

        info!(
            "Started {} as PID {} (logs: {})",
            label,
            pid,
            stdout_path.display()
        );
        spawn_reaper(child);
        Ok(pid)
    }

    /// Start the highest installed version.
    pub fn start_latest(&self) -> Result<(String, u32)> {
        let label = self
            .latest_version()?
            .ok_or_else(|| FgError::Other("No versions are installed".to_string()))?;
        let pid = self.start(&label)?;
        Ok((label, pid))
    }
}
