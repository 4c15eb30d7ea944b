//! `fgmanifest.json`, the launch description shipped with every version.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed version manifest.
///
/// Only `runCommand` and `jdk.version` matter to the supervisor; the rest is
/// carried for listings. Unknown keys (download URLs and the like) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Launch command, trusted verbatim apart from runtime/classpath injection.
    #[serde(default)]
    pub run_command: Option<String>,
    /// Required Java runtime.
    #[serde(default)]
    pub jdk: Option<RuntimeRequirement>,
    /// Maven dependencies, fetched into `libs/` at install time.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Primary artifact file name inside the version directory.
    #[serde(default)]
    pub artifact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeRequirement {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl Dependency {
    /// File name the installer stores this dependency under in `libs/`.
    pub fn jar_name(&self) -> String {
        format!("{}-{}.jar", self.artifact_id, self.version)
    }
}

impl VersionManifest {
    /// The launch command, if present and not blank.
    pub fn launch_command(&self) -> Option<&str> {
        self.run_command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }

    pub fn runtime_version(&self) -> Option<&str> {
        self.jdk
            .as_ref()
            .map(|jdk| jdk.version.trim())
            .filter(|v| !v.is_empty())
    }

    /// Primary artifact name, defaulting to `java-app-{label}.jar`.
    pub fn primary_artifact(&self, label: &str) -> String {
        self.artifact
            .clone()
            .unwrap_or_else(|| format!("java-app-{}.jar", label))
    }
    /// Declared dependencies whose jar is absent from `libs_dir`.
    pub fn missing_dependencies(&self, libs_dir: &Path) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|dep| !libs_dir.join(dep.jar_name()).is_file())
            .collect()
    }
}
