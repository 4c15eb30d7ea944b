//! Effective launch command for an installed version.

use crate::config::PathsConfig;
use crate::error::{FgError, LaunchError, Result};
use crate::install::{RuntimeResolver, VersionManifest};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const JAVA_LAUNCHERS: &[&str] = &["java", "java.exe", "javaw", "javaw.exe"];
const CLASSPATH_FLAGS: &[&str] = &["-cp", "-classpath", "--class-path"];

/// Program, arguments and working directory of one launch.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    /// Build the command for `label` from its manifest.
    ///
    /// A Java launcher as the program token is swapped for the resolved
    /// runtime and gets `-cp` unless the command already sets a classpath.
    /// Any other program is run verbatim.
    pub fn build(
        label: &str,
        manifest: &VersionManifest,
        version_dir: &Path,
        runtime: &dyn RuntimeResolver,
    ) -> Result<Self> {
        let command = manifest
            .launch_command()
            .ok_or_else(|| LaunchError::NoManifest {
                label: label.to_string(),
                reason: "manifest has no launch command".to_string(),
            })?;

        let mut tokens = command.split_whitespace();
        let program_token = tokens.next().ok_or_else(|| LaunchError::NoManifest {
            label: label.to_string(),
            reason: "manifest has no launch command".to_string(),
        })?;
        let rest: Vec<&str> = tokens.collect();

        // Resolve even when the command runs something else, so a missing
        // runtime is reported before anything is spawned.
        let runtime_path = match manifest.runtime_version() {
            Some(version) => Some(runtime.runtime_executable_path(version)?),
            None => None,
        };

        let java = is_java_launcher(program_token);
        let program = if java {
            runtime_path.ok_or_else(|| LaunchError::NoManifest {
                label: label.to_string(),
                reason: "manifest declares no runtime version".to_string(),
            })?
        } else {
            PathBuf::from(program_token)
        };

        // Anything other than a Java launcher runs exactly as written.
        let mut args: Vec<OsString> = Vec::with_capacity(rest.len() + 2);
        if java && !has_classpath_flag(&rest) {
            let entries = classpath_entries(label, manifest, version_dir)?;
            if !entries.is_empty() {
                let joined = std::env::join_paths(&entries).map_err(|e| {
                    LaunchError::InvalidCommand {
                        label: label.to_string(),
                        reason: format!("cannot join classpath: {}", e),
                    }
                })?;
                args.push("-cp".into());
                args.push(joined);
            }
        }
        args.extend(rest.iter().map(OsString::from));

        Ok(Self {
            program,
            args,
            working_dir: version_dir.to_path_buf(),
        })
    }

    /// A `Command` ready for stdio redirection and detaching.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.working_dir);
        cmd
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

fn is_java_launcher(token: &str) -> bool {
    JAVA_LAUNCHERS.contains(&token)
}

fn has_classpath_flag(args: &[&str]) -> bool {
    args.iter().any(|arg| {
        CLASSPATH_FLAGS.contains(arg)
            || CLASSPATH_FLAGS
                .iter()
                .any(|flag| arg.strip_prefix(flag).is_some_and(|r| r.starts_with('=')))
    })
}

/// Primary artifact (when present) followed by `libs/*.jar` in name order.
pub fn classpath_entries(
    label: &str,
    manifest: &VersionManifest,
    version_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();

    let artifact = version_dir.join(manifest.primary_artifact(label));
    if artifact.is_file() {
        entries.push(artifact);
    }

    let libs_dir = version_dir.join(PathsConfig::LIBS_DIR_NAME);
    let libs = match fs::read_dir(&libs_dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(FgError::io_with_path(e, &libs_dir)),
    };

    let mut jars: Vec<PathBuf> = libs
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
        })
        .collect();
    jars.sort();
    entries.extend(jars);

    Ok(entries)
}
