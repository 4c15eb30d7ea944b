//! Per-user directory layout.
//!
//! Everything fg persists lives under one root (`~/.fg` by default):
//!
//! ```text
//! {root}/versions/{label}/fgmanifest.json
//! {root}/versions/{label}/libs/*.jar
//! {root}/jdk/jdk-{runtime_version}/bin/java
//! {root}/logs/{label}_{YYYYMMDD_HHMMSS}.log|.err
//! {root}/processes.json
//! ```

use crate::config::{AppConfig, PathsConfig};
use crate::error::{FgError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved filesystem locations for one fg home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FgPaths {
    root: PathBuf,
}

impl FgPaths {
    /// Use an explicit root directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve the root from `$FG_HOME`, falling back to `~/.fg`.
    pub fn from_env() -> Result<Self> {
        if let Some(home) = std::env::var_os(AppConfig::HOME_ENV_VAR) {
            if !home.is_empty() {
                return Ok(Self::new(PathBuf::from(home)));
            }
        }

        let home = dirs::home_dir().ok_or_else(|| FgError::Config {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(Self::new(home.join(PathsConfig::ROOT_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::VERSIONS_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::LOGS_DIR_NAME)
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::RUNTIMES_DIR_NAME)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(PathsConfig::REGISTRY_FILENAME)
    }

    pub fn registry_lock_path(&self) -> PathBuf {
        self.root.join(PathsConfig::REGISTRY_LOCK_FILENAME)
    }

    /// Create the root, versions, runtimes and logs directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.versions_dir(),
            self.runtimes_dir(),
            self.logs_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| FgError::Io {
                message: format!("Failed to create directory {}", dir.display()),
                path: Some(dir.clone()),
                source: Some(e),
            })?;
        }
        Ok(())
    }
}
