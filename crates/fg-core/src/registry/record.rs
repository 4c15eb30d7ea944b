//! Instance records as persisted in the registry document.

use crate::config::StatusConfig;
use crate::logs::LogStream;
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Registry contents: process ID to record.
///
/// Serialized as a JSON object whose keys are the PIDs in string form.
pub type InstanceMap = BTreeMap<u32, InstanceRecord>;

/// One spawned process running an installed version.
///
/// Records are immutable once written; the only change a record ever sees is
/// being dropped. Documents with extra or missing fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceRecord {
    /// Installed version this instance runs.
    #[serde(rename = "version")]
    pub version_label: String,
    /// Spawn time, seconds since the Unix epoch.
    pub start_time: f64,
    /// Append-only stdout log.
    #[serde(rename = "log_file")]
    pub stdout_sink: PathBuf,
    /// Append-only stderr log.
    #[serde(rename = "err_file")]
    pub stderr_sink: PathBuf,
}

impl InstanceRecord {
    pub fn new(
        version_label: impl Into<String>,
        start_time: f64,
        stdout_sink: impl Into<PathBuf>,
        stderr_sink: impl Into<PathBuf>,
    ) -> Self {
        Self {
            version_label: version_label.into(),
            start_time,
            stdout_sink: stdout_sink.into(),
            stderr_sink: stderr_sink.into(),
        }
    }

    pub fn sink(&self, stream: LogStream) -> &Path {
        match stream {
            LogStream::Stdout => &self.stdout_sink,
            LogStream::Stderr => &self.stderr_sink,
        }
    }

    /// Time elapsed since spawn, clamped at zero for clocks that moved backwards.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let now_secs = now.timestamp_millis() as f64 / 1000.0;
        Duration::from_secs_f64((now_secs - self.start_time).max(0.0))
    }

    /// Spawn time in the local timezone, e.g. `2024-05-01 13:45:10`.
    pub fn started_at_display(&self) -> String {
        let millis = (self.start_time * 1000.0) as i64;
        match Local.timestamp_millis_opt(millis).single() {
            Some(dt) => dt.format(StatusConfig::START_TIME_DISPLAY_FORMAT).to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Render an elapsed duration as `1d 02h 03m 04s`, dropping leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );

    if days > 0 {
        format!("{}d {:02}h {:02}m {:02}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
