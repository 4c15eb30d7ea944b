//! Reading the sinks of managed instances.

use super::supervisor::Supervisor;
use crate::error::{FgError, Result};
use crate::logs::{self, LogFollow, LogStream};
use std::path::PathBuf;

impl Supervisor {
    /// Sink of a live managed instance.
    ///
    /// Fails with [`FgError::NotManaged`] for PIDs outside the reconciled
    /// registry and [`FgError::SinkMissing`] when the file has been removed.
    pub fn sink_path(&self, pid: u32, stream: LogStream) -> Result<PathBuf> {
        let instances = self.store.read(&self.reconciler)?;
        let record = instances.get(&pid).ok_or(FgError::NotManaged { pid })?;

        let path = record.sink(stream).to_path_buf();
        if !path.is_file() {
            return Err(FgError::SinkMissing { pid, path });
        }
        Ok(path)
    }

    /// Last `n` lines of the stdout sink.
    pub fn tail(&self, pid: u32, n: usize) -> Result<Vec<String>> {
        self.tail_stream(pid, LogStream::Stdout, n)
    }

    pub fn tail_stream(&self, pid: u32, stream: LogStream, n: usize) -> Result<Vec<String>> {
        logs::tail_lines(&self.sink_path(pid, stream)?, n)
    }

    /// Whole stdout sink.
    pub fn read_all(&self, pid: u32) -> Result<String> {
        self.read_all_stream(pid, LogStream::Stdout)
    }

    pub fn read_all_stream(&self, pid: u32, stream: LogStream) -> Result<String> {
        logs::read_all(&self.sink_path(pid, stream)?)
    }

    /// Last `n` lines of the stdout sink, then every line appended after,
    /// until the returned handle is cancelled or dropped.
    pub fn follow(&self, pid: u32, n: usize) -> Result<LogFollow> {
        self.follow_stream(pid, LogStream::Stdout, n)
    }

    pub fn follow_stream(&self, pid: u32, stream: LogStream, n: usize) -> Result<LogFollow> {
        LogFollow::start(self.sink_path(pid, stream)?, n, self.follow_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FgPaths;
    use crate::registry::{FakeTable, InstanceRecord};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const PID: u32 = 4242;

    fn supervisor_with_sinks(temp_dir: &TempDir) -> (Supervisor, PathBuf, PathBuf) {
        let supervisor = Supervisor::builder(FgPaths::new(temp_dir.path()))
            .process_table(FakeTable::with(&[(PID, 0)]))
            .follow_interval(Duration::from_millis(20))
            .build()
            .unwrap();

        let stdout = temp_dir.path().join("logs").join("1.0.0_20240501_090000.log");
        let stderr = temp_dir.path().join("logs").join("1.0.0_20240501_090000.err");
        let out_text: String = (1..=120).map(|i| format!("out {}\n", i)).collect();
        fs::write(&stdout, out_text).unwrap();
        fs::write(&stderr, "err 1\nerr 2\n").unwrap();

        let record = InstanceRecord::new("1.0.0", 0.0, &stdout, &stderr);
        supervisor
            .store
            .update(&supervisor.reconciler, |map| map.insert(PID, record))
            .unwrap();
        (supervisor, stdout, stderr)
    }

    #[test]
    fn test_tail_last_fifty_of_hundred_twenty() {
        let temp_dir = TempDir::new().unwrap();
        let (supervisor, _, _) = supervisor_with_sinks(&temp_dir);

        let lines = supervisor.tail(PID, 50).unwrap();
        let expected: Vec<String> = (71..=120).map(|i| format!("out {}", i)).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_tail_stderr_and_read_all() {
        let temp_dir = TempDir::new().unwrap();
        let (supervisor, _, _) = supervisor_with_sinks(&temp_dir);

        assert_eq!(
            supervisor.tail_stream(PID, LogStream::Stderr, 1).unwrap(),
            vec!["err 2"]
        );
        assert_eq!(supervisor.read_all(PID).unwrap().lines().count(), 120);
        assert_eq!(
            supervisor.read_all_stream(PID, LogStream::Stderr).unwrap(),
            "err 1\nerr 2\n"
        );
    }

    #[test]
    fn test_unknown_pid_is_not_managed() {
        let temp_dir = TempDir::new().unwrap();
        let (supervisor, _, _) = supervisor_with_sinks(&temp_dir);

        assert!(matches!(
            supervisor.tail(PID + 1, 5),
            Err(FgError::NotManaged { pid }) if pid == PID + 1
        ));
        assert!(matches!(
            supervisor.follow(PID + 1, 5),
            Err(FgError::NotManaged { .. })
        ));
    }

    #[test]
    fn test_removed_sink_is_sink_missing() {
        let temp_dir = TempDir::new().unwrap();
        let (supervisor, stdout, _) = supervisor_with_sinks(&temp_dir);
        fs::remove_file(&stdout).unwrap();

        assert!(matches!(
            supervisor.tail(PID, 5),
            Err(FgError::SinkMissing { ref path, .. }) if *path == stdout
        ));
    }

    #[test]
    fn test_follow_emits_appended_line() {
        use std::io::Write;

        let temp_dir = TempDir::new().unwrap();
        let (supervisor, stdout, _) = supervisor_with_sinks(&temp_dir);

        let follow = supervisor.follow(PID, 2).unwrap();
        let wait = Duration::from_secs(2);
        assert_eq!(follow.recv_timeout(wait).unwrap().unwrap(), "out 119");
        assert_eq!(follow.recv_timeout(wait).unwrap().unwrap(), "out 120");

        let mut file = fs::OpenOptions::new().append(true).open(&stdout).unwrap();
        writeln!(file, "fresh").unwrap();
        assert_eq!(follow.recv_timeout(wait).unwrap().unwrap(), "fresh");
    }
}
