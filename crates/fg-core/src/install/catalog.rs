//! Installed-version catalog.

use super::manifest::VersionManifest;
use crate::config::PathsConfig;
use crate::error::{FgError, LaunchError, Result};
use semver::Version;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only view of the installed versions.
///
/// Installing, updating and uninstalling happen elsewhere; the supervisor only
/// needs to find a version's directory and manifest.
pub trait VersionCatalog: Send + Sync {
    fn is_version_installed(&self, label: &str) -> bool;

    /// Fails with [`LaunchError::NotInstalled`] when no manifest exists and
    /// [`LaunchError::NoManifest`] when it cannot be read or parsed.
    fn get_manifest(&self, label: &str) -> Result<VersionManifest>;

    fn version_dir(&self, label: &str) -> PathBuf;

    /// Installed labels, sorted oldest to newest.
    fn installed_versions(&self) -> Result<Vec<String>>;
}

/// Versions laid out as `{versions_dir}/{label}/fgmanifest.json`.
#[derive(Debug, Clone)]
pub struct LocalVersions {
    versions_dir: PathBuf,
}

impl LocalVersions {
    pub fn new(versions_dir: impl AsRef<Path>) -> Self {
        Self {
            versions_dir: versions_dir.as_ref().to_path_buf(),
        }
    }

    fn manifest_path(&self, label: &str) -> PathBuf {
        self.version_dir(label).join(PathsConfig::MANIFEST_FILENAME)
    }
}

/// A label names one directory entry; anything that could escape the
/// versions directory is never installed.
fn is_plain_label(label: &str) -> bool {
    !label.is_empty()
        && label != "."
        && label != ".."
        && !label.contains(['/', '\\'])
        && !label.contains('\0')
}

impl VersionCatalog for LocalVersions {
    fn is_version_installed(&self, label: &str) -> bool {
        is_plain_label(label) && self.manifest_path(label).is_file()
    }

    fn get_manifest(&self, label: &str) -> Result<VersionManifest> {
        if !self.is_version_installed(label) {
            return Err(FgError::not_installed(label));
        }

        let path = self.manifest_path(label);
        let contents = fs::read_to_string(&path).map_err(|e| LaunchError::NoManifest {
            label: label.to_string(),
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            LaunchError::NoManifest {
                label: label.to_string(),
                reason: format!("cannot parse {}: {}", path.display(), e),
            }
            .into()
        })
    }

    fn version_dir(&self, label: &str) -> PathBuf {
        self.versions_dir.join(label)
    }

    fn installed_versions(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.versions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(FgError::io_with_path(e, &self.versions_dir)),
        };

        let mut versions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|label| self.is_version_installed(label))
            .collect();
        versions.sort_by(|a, b| compare_labels(a, b));

        debug!("Found {} installed versions", versions.len());
        Ok(versions)
    }
}

fn parse_label(label: &str) -> Option<Version> {
    Version::parse(label.strip_prefix('v').unwrap_or(label)).ok()
}

/// Semantic-version order where both labels parse, lexical otherwise.
/// Labels that parse sort after those that don't.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (parse_label(a), parse_label(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// The newest installed version, if any.
pub fn latest_installed(catalog: &dyn VersionCatalog) -> Result<Option<String>> {
    Ok(catalog.installed_versions()?.pop())
}
