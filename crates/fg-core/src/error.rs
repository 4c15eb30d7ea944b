//! Error types for the fg supervisor.
//!
//! Every public operation converts OS and filesystem failures into one of these
//! variants at its boundary, so a front-end can always render a short, specific
//! message instead of crashing.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the launch path (`Supervisor::start`).
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Version {label} is not installed")]
    NotInstalled { label: String },

    #[error("No usable manifest for version {label}: {reason}")]
    NoManifest { label: String, reason: String },

    #[error("Runtime {runtime_version} is not installed")]
    RuntimeMissing { runtime_version: String },

    #[error("Invalid launch command for version {label}: {reason}")]
    InvalidCommand { label: String, reason: String },

    #[error("Failed to spawn version {label}: {source}")]
    SpawnFailed {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// Main error type for the fg supervisor.
#[derive(Debug, Error)]
pub enum FgError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("PID {pid} is not a managed application")]
    NotManaged { pid: u32 },

    #[error("Log file not found for PID {pid}: {path}")]
    SinkMissing { pid: u32, path: PathBuf },

    // Registry errors
    #[error("Registry document {path} is malformed: {message}")]
    RegistryCorrupt { path: PathBuf, message: String },

    #[error("Failed to lock registry {path}: {source}")]
    RegistryLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to signal process {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for fg operations.
pub type Result<T> = std::result::Result<T, FgError>;

impl From<std::io::Error> for FgError {
    fn from(err: std::io::Error) -> Self {
        FgError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FgError {
    fn from(err: serde_json::Error) -> Self {
        FgError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FgError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FgError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for [`LaunchError::NotInstalled`].
    pub fn not_installed(label: impl Into<String>) -> Self {
        LaunchError::NotInstalled {
            label: label.into(),
        }
        .into()
    }

    /// Whether this is a normal, expected outcome rather than a fault.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            FgError::NotManaged { .. } | FgError::Launch(LaunchError::NotInstalled { .. })
        )
    }

    /// Map to a stable process exit code for command-line front-ends.
    ///
    /// - 1: generic failure
    /// - 3: the PID or its log is not managed by fg
    /// - 4: the launch path failed (not installed, runtime missing, spawn failure)
    /// - 5: registry or filesystem failure
    pub fn exit_code(&self) -> i32 {
        match self {
            FgError::NotManaged { .. } | FgError::SinkMissing { .. } => 3,
            FgError::Launch(_) => 4,
            FgError::RegistryCorrupt { .. }
            | FgError::RegistryLock { .. }
            | FgError::Io { .. }
            | FgError::Json { .. } => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FgError::NotManaged { pid: 4242 };
        assert_eq!(err.to_string(), "PID 4242 is not a managed application");

        let err = FgError::not_installed("1.2.0");
        assert_eq!(err.to_string(), "Version 1.2.0 is not installed");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(FgError::NotManaged { pid: 1 }.exit_code(), 3);
        assert_eq!(
            FgError::from(LaunchError::RuntimeMissing {
                runtime_version: "17".into()
            })
            .exit_code(),
            4
        );
        assert_eq!(
            FgError::from(std::io::Error::other("disk full")).exit_code(),
            5
        );
        assert_eq!(FgError::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_expected_outcomes() {
        assert!(FgError::NotManaged { pid: 7 }.is_expected());
        assert!(FgError::not_installed("2.0.0").is_expected());
        assert!(!FgError::Config {
            message: "no home".into()
        }
        .is_expected());
    }
}
