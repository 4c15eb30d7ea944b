//! Java runtime lookup.

use crate::error::{LaunchError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[cfg(windows)]
const JAVA_EXECUTABLE: &str = "java.exe";
#[cfg(not(windows))]
const JAVA_EXECUTABLE: &str = "java";

/// Resolves a runtime version to its launcher executable.
pub trait RuntimeResolver: Send + Sync {
    /// Fails with [`LaunchError::RuntimeMissing`] when the runtime is not
    /// installed.
    fn runtime_executable_path(&self, runtime_version: &str) -> Result<PathBuf>;
}

/// Runtimes unpacked as `{runtimes_dir}/jdk-{version}/`.
#[derive(Debug, Clone)]
pub struct JdkResolver {
    runtimes_dir: PathBuf,
}

impl JdkResolver {
    pub fn new(runtimes_dir: impl AsRef<Path>) -> Self {
        Self {
            runtimes_dir: runtimes_dir.as_ref().to_path_buf(),
        }
    }

    pub fn runtime_dir(&self, runtime_version: &str) -> PathBuf {
        self.runtimes_dir.join(format!("jdk-{}", runtime_version))
    }

    /// Archives often unpack into a nested directory (`jdk-17/jdk-17.0.2+8/`),
    /// or a macOS bundle layout, so fall back to searching for the launcher.
    fn find_nested(root: &Path) -> Option<PathBuf> {
        WalkDir::new(root)
            .max_depth(5)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                entry.file_name() == JAVA_EXECUTABLE
                    && entry
                        .path()
                        .parent()
                        .and_then(Path::file_name)
                        .is_some_and(|dir| dir == "bin")
            })
            .map(|entry| entry.into_path())
    }
}

impl RuntimeResolver for JdkResolver {
    fn runtime_executable_path(&self, runtime_version: &str) -> Result<PathBuf> {
        let root = self.runtime_dir(runtime_version);
        let direct = root.join("bin").join(JAVA_EXECUTABLE);
        if direct.is_file() {
            return Ok(direct);
        }

        if root.is_dir() {
            if let Some(found) = Self::find_nested(&root) {
                debug!("Resolved runtime {} to {}", runtime_version, found.display());
                return Ok(found);
            }
        }

        Err(LaunchError::RuntimeMissing {
            runtime_version: runtime_version.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FgError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_direct_layout() {
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("jdk-17").join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(JAVA_EXECUTABLE), "").unwrap();

        let resolver = JdkResolver::new(temp_dir.path());
        assert_eq!(
            resolver.runtime_executable_path("17").unwrap(),
            bin.join(JAVA_EXECUTABLE)
        );
    }

    #[test]
    fn test_nested_layout() {
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir
            .path()
            .join("jdk-21")
            .join("jdk-21.0.1+12")
            .join("Contents")
            .join("Home")
            .join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(JAVA_EXECUTABLE), "").unwrap();

        let resolver = JdkResolver::new(temp_dir.path());
        assert_eq!(
            resolver.runtime_executable_path("21").unwrap(),
            bin.join(JAVA_EXECUTABLE)
        );
    }

    #[test]
    fn test_missing_runtime() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = JdkResolver::new(temp_dir.path());

        let err = resolver.runtime_executable_path("11").unwrap_err();
        assert!(matches!(
            err,
            FgError::Launch(LaunchError::RuntimeMissing { ref runtime_version })
                if runtime_version == "11"
        ));
    }
}
