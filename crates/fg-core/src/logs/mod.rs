//! Reading instance output sinks.
//!
//! Sinks are small append-only files written by exactly one process, so
//! `tail` reads the whole file and slices; `follow` polls for growth.

mod follow;

pub use follow::LogFollow;

use crate::config::LogConfig;
use crate::error::{FgError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Which of an instance's two sinks to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    #[default]
    Stdout,
    Stderr,
}

impl LogStream {
    /// Sink file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            LogStream::Stdout => LogConfig::STDOUT_EXTENSION,
            LogStream::Stderr => LogConfig::STDERR_EXTENSION,
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStream::Stdout => write!(f, "stdout"),
            LogStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Whole sink contents, invalid UTF-8 replaced.
pub fn read_all(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| FgError::io_with_path(e, path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// At most the last `n` lines of `path`, in file order.
pub fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    Ok(last_lines(&read_all(path)?, n))
}

pub(crate) fn last_lines(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].iter().map(|line| line.to_string()).collect()
}
