//! Live following of a sink.
//!
//! A dedicated thread owns the file handle and polls for growth at a fixed
//! interval. Lines reach the consumer over a channel; dropping the
//! [`LogFollow`] (or calling [`LogFollow::cancel`]) stops the thread and
//! closes the file on every path.

use super::last_lines;
use crate::error::{FgError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Handle to a running follow. Yields lines until cancelled.
pub struct LogFollow {
    lines: Receiver<Result<String>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl LogFollow {
    /// Start following `path`.
    ///
    /// The last `initial_lines` complete lines are emitted first, then every
    /// line appended afterwards, checked every `poll_interval`. Fails only if
    /// the file cannot be opened.
    pub fn start(
        path: impl AsRef<Path>,
        initial_lines: usize,
        poll_interval: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| FgError::io_with_path(e, &path))?;

        let (line_tx, line_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();

        let mut poller = Poller {
            file,
            path: path.clone(),
            offset: 0,
            pending: Vec::new(),
            lines: line_tx,
        };

        let worker = thread::Builder::new()
            .name("fg-follow".to_string())
            .spawn(move || poller.run(initial_lines, poll_interval, stop_rx))
            .map_err(|e| FgError::io_with_path(e, &path))?;

        debug!("Following {}", path.display());
        Ok(Self {
            lines: line_rx,
            stop: Some(stop_tx),
            worker: Some(worker),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait up to `timeout` for the next line.
    ///
    /// `None` means nothing arrived in time, or the follow has ended.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Result<String>> {
        self.lines.recv_timeout(timeout).ok()
    }

    /// Whether the poller is still running. Once it is not, lines already
    /// received remain readable and then the follow ends.
    pub fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Stop the poller and wait for it to release the file.
    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The poller may already have exited on an error.
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Follow thread for {} panicked", self.path.display());
            }
        }
    }
}

impl Iterator for LogFollow {
    type Item = Result<String>;

    /// Blocks until the next line. Ends after cancellation or a read error.
    fn next(&mut self) -> Option<Self::Item> {
        self.lines.recv().ok()
    }
}

impl Drop for LogFollow {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Poller {
    file: File,
    path: PathBuf,
    offset: u64,
    /// Bytes of a line whose newline has not arrived yet.
    pending: Vec<u8>,
    lines: Sender<Result<String>>,
}

impl Poller {
    fn run(&mut self, initial_lines: usize, poll_interval: Duration, stop: Receiver<()>) {
        if let Err(e) = self.emit_initial(initial_lines) {
            let _ = self.lines.send(Err(e));
            return;
        }

        loop {
            match stop.recv_timeout(poll_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            match self.poll() {
                Ok(true) => {}
                // Consumer went away.
                Ok(false) => break,
                Err(e) => {
                    let _ = self.lines.send(Err(e));
                    break;
                }
            }
        }
        debug!("Stopped following {}", self.path.display());
    }

    fn emit_initial(&mut self, initial_lines: usize) -> Result<()> {
        let chunk = self.read_new()?;
        let complete = match chunk.iter().rposition(|&b| b == b'\n') {
            Some(end) => {
                self.pending.extend_from_slice(&chunk[end + 1..]);
                &chunk[..end + 1]
            }
            None => {
                self.pending.extend_from_slice(&chunk);
                &[][..]
            }
        };

        for line in last_lines(&String::from_utf8_lossy(complete), initial_lines) {
            if self.lines.send(Ok(line)).is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Emit any newly completed lines. Returns `false` once nobody listens.
    fn poll(&mut self) -> Result<bool> {
        let len = self
            .file
            .metadata()
            .map_err(|e| FgError::io_with_path(e, &self.path))?
            .len();

        if len < self.offset {
            debug!("{} was truncated, restarting from the top", self.path.display());
            self.offset = 0;
            self.pending.clear();
        }
        if len == self.offset {
            return Ok(true);
        }

        let chunk = self.read_new()?;
        self.pending.extend_from_slice(&chunk);

        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw[..end]);
            let line = line.strip_suffix('\r').unwrap_or(&*line).to_string();
            if self.lines.send(Ok(line)).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn read_new(&mut self) -> Result<Vec<u8>> {
        let mut chunk = Vec::new();
        self.file
            .seek(SeekFrom::Start(self.offset))
            .and_then(|_| self.file.read_to_end(&mut chunk))
            .map_err(|e| FgError::io_with_path(e, &self.path))?;
        self.offset += chunk.len() as u64;
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(2);

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn next_line(follow: &LogFollow) -> String {
        follow.recv_timeout(WAIT).unwrap().unwrap()
    }

    #[test]
    fn test_emits_tail_then_appended_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let follow = LogFollow::start(&path, 2, POLL).unwrap();
        assert_eq!(next_line(&follow), "two");
        assert_eq!(next_line(&follow), "three");

        append(&path, "four\n");
        assert_eq!(next_line(&follow), "four");
    }

    #[test]
    fn test_partial_line_is_held_until_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        fs::write(&path, "done\nhal").unwrap();

        let follow = LogFollow::start(&path, 10, POLL).unwrap();
        assert_eq!(next_line(&follow), "done");
        assert!(follow.recv_timeout(POLL * 5).is_none());

        append(&path, "f\r\n");
        assert_eq!(next_line(&follow), "half");
    }

    #[test]
    fn test_truncation_restarts_from_top() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        fs::write(&path, "old line one\nold line two\n").unwrap();

        let follow = LogFollow::start(&path, 0, POLL).unwrap();
        // Truncate in place; the poller keeps the same handle.
        OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
        std::thread::sleep(POLL * 5);
        append(&path, "new\n");

        assert_eq!(next_line(&follow), "new");
    }

    #[test]
    fn test_cancel_ends_iteration() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let mut follow = LogFollow::start(&path, 5, POLL).unwrap();
        assert!(follow.is_active());
        follow.cancel();
        assert!(!follow.is_active());
        assert!(follow.next().is_none());
        // Cancelling twice is harmless.
        follow.cancel();
    }

    #[test]
    fn test_missing_file_fails_to_start() {
        let temp_dir = TempDir::new().unwrap();
        let result = LogFollow::start(temp_dir.path().join("gone.log"), 5, POLL);
        assert!(matches!(result, Err(FgError::Io { .. })));
    }
}
