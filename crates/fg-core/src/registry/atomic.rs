//! Atomic JSON persistence for the registry document.
//!
//! Writes go to a temp file with a PID suffix, are fsynced, then renamed over
//! the target, so a reader in another invocation sees either the old document
//! or the new one and never a torn write.

use crate::error::{FgError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process;
use tracing::debug;

/// Outcome of reading a JSON document that may be missing or malformed.
#[derive(Debug)]
pub enum JsonDocument<T> {
    /// No file at the path.
    Missing,
    /// File exists but holds only whitespace.
    Empty,
    /// Parsed successfully.
    Parsed(T),
    /// File exists but does not parse as `T`.
    Malformed(serde_json::Error),
}

/// Read and parse a JSON file.
///
/// Only genuine I/O failures are errors; missing, empty and malformed
/// documents are reported through [`JsonDocument`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<JsonDocument<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JsonDocument::Missing),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Ok(JsonDocument::Malformed(serde_json::Error::io(e)))
        }
        Err(e) => {
            return Err(FgError::Io {
                message: format!("Failed to read {}", path.display()),
                path: Some(path.to_path_buf()),
                source: Some(e),
            })
        }
    };

    if contents.trim().is_empty() {
        return Ok(JsonDocument::Empty);
    }

    Ok(match serde_json::from_str(&contents) {
        Ok(data) => JsonDocument::Parsed(data),
        Err(e) => JsonDocument::Malformed(e),
    })
}

/// Write data to a JSON file atomically.
///
/// This function:
/// 1. Serializes data to a temp file with a PID suffix
/// 2. Calls fsync to ensure data reaches disk
/// 3. Atomically renames the temp file to the target
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FgError::Io {
            message: format!("Failed to create directory {}", parent.display()),
            path: Some(parent.to_path_buf()),
            source: Some(e),
        })?;
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", process::id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| FgError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;

    let write_result = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        file.sync_all()
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(FgError::Io {
            message: format!("Failed to write temp file {}", temp_path.display()),
            path: Some(temp_path),
            source: Some(e),
        });
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(FgError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            ),
            path: Some(path.to_path_buf()),
            source: Some(e),
        });
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.json");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        write_json_atomic(&path, &data).unwrap();
        assert!(path.exists());

        match read_json::<TestData>(&path).unwrap() {
            JsonDocument::Parsed(read) => assert_eq!(read, data),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("test.json")]);
    }

    #[test]
    fn test_read_missing_empty_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");

        assert!(matches!(
            read_json::<TestData>(&path).unwrap(),
            JsonDocument::Missing
        ));

        fs::write(&path, "  \n").unwrap();
        assert!(matches!(
            read_json::<TestData>(&path).unwrap(),
            JsonDocument::Empty
        ));

        fs::write(&path, "{\"name\": ").unwrap();
        assert!(matches!(
            read_json::<TestData>(&path).unwrap(),
            JsonDocument::Malformed(_)
        ));
    }

    #[test]
    fn test_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("test.json");

        write_json_atomic(&path, &TestData {
            name: "nested".to_string(),
            value: 99,
        })
        .unwrap();
        assert!(path.exists());
    }
}
