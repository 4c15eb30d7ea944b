//! Plain-text rendering for terminal output.

use fg_core::{InstanceMap, StatusEntry, StopOutcome, VersionConfig};

const STATUS_HEADERS: [&str; 6] = ["PID", "VERSION", "STARTED", "UPTIME", "CPU%", "MEM(MB)"];

/// Left-aligned columns separated by two spaces.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = render_row(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&render_row(row.iter().map(String::as_str).collect()));
    }
    out
}

pub fn status_table(entries: &[StatusEntry]) -> String {
    if entries.is_empty() {
        return "No managed instances running.".to_string();
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                entry.pid.to_string(),
                entry.version_label.clone(),
                entry.started_at.clone(),
                entry.uptime_display.clone(),
                format!("{:.1}", entry.cpu_percent),
                format!("{:.1}", entry.memory_mb),
            ]
        })
        .collect();
    table(&STATUS_HEADERS, &rows)
}

/// Installed versions, newest last, with their running instance count.
pub fn version_list(versions: &[String], instances: &InstanceMap) -> String {
    if versions.is_empty() {
        return "No versions installed.".to_string();
    }

    let rows: Vec<Vec<String>> = versions
        .iter()
        .map(|label| {
            let running = instances
                .values()
                .filter(|record| &record.version_label == label)
                .count();
            let state = match running {
                0 => String::new(),
                1 => "running".to_string(),
                n => format!("running ({})", n),
            };
            vec![label.clone(), state]
        })
        .collect();
    table(&["VERSION", "STATE"], &rows)
}

/// Pretty-printed manifest, followed by any dependency jars missing from `libs/`.
pub fn version_config(config: &VersionConfig) -> serde_json::Result<String> {
    let mut out = format!(
        "Configuration for version {} ({}):\n{}",
        config.label,
        config.version_dir.display(),
        serde_json::to_string_pretty(&config.manifest)?
    );
    for jar in &config.missing_dependencies {
        out.push_str(&format!("\nwarning: libs/{} is missing", jar));
    }
    Ok(out)
}

pub fn stop_message(pid: u32, outcome: &StopOutcome) -> String {
    match outcome {
        StopOutcome::Stopped => format!("Stopped PID {}", pid),
        StopOutcome::AlreadyDead => format!("PID {} had already exited", pid),
        StopOutcome::NotManaged => format!("PID {} is not a managed application", pid),
        StopOutcome::Failed(reason) => format!("Failed to stop PID {}: {}", pid, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_core::InstanceRecord;
    use std::path::PathBuf;
    use std::time::Duration;

    fn entry(pid: u32, label: &str) -> StatusEntry {
        StatusEntry {
            pid,
            version_label: label.to_string(),
            running: true,
            start_time: 0.0,
            started_at: "2024-05-01 13:45:10".to_string(),
            uptime: Duration::from_secs(64),
            uptime_display: "1m 04s".to_string(),
            cpu_percent: 1.25,
            memory_mb: 312.4,
            stdout_sink: PathBuf::from("a.log"),
            stderr_sink: PathBuf::from("a.err"),
        }
    }

    #[test]
    fn test_status_table() {
        let out = status_table(&[entry(4242, "1.2.0"), entry(17, "1.10.0")]);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PID   VERSION"));
        assert!(lines[1].starts_with("4242  1.2.0 "));
        assert!(lines[2].starts_with("17    1.10.0"));
        assert!(lines[1].contains("1m 04s"));
        assert!(lines[1].ends_with("312.4"));
    }

    #[test]
    fn test_empty_status() {
        assert_eq!(status_table(&[]), "No managed instances running.");
    }

    #[test]
    fn test_version_list_counts_instances() {
        let mut instances = InstanceMap::new();
        for pid in [1, 2] {
            instances.insert(pid, InstanceRecord::new("1.2.0", 0.0, "a.log", "a.err"));
        }

        let out = version_list(&["1.0.0".to_string(), "1.2.0".to_string()], &instances);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "1.0.0");
        assert_eq!(lines[2], "1.2.0    running (2)");
    }

    #[test]
    fn test_version_config() {
        let manifest = serde_json::from_str(
            r#"{"name": "Demo", "runCommand": "java -jar app.jar", "jdk": {"version": "17"}}"#,
        )
        .unwrap();
        let mut config = VersionConfig {
            label: "1.2.0".to_string(),
            version_dir: PathBuf::from("/fg/versions/1.2.0"),
            manifest,
            missing_dependencies: Vec::new(),
        };

        let out = version_config(&config).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("Configuration for version 1.2.0 (/fg/versions/1.2.0):")
        );
        let json: serde_json::Value =
            serde_json::from_str(&lines.collect::<Vec<_>>().join("\n")).unwrap();
        assert_eq!(json["runCommand"], "java -jar app.jar");
        assert_eq!(json["jdk"]["version"], "17");

        config.missing_dependencies.push("gson-2.10.1.jar".to_string());
        let out = version_config(&config).unwrap();
        assert!(out.ends_with("warning: libs/gson-2.10.1.jar is missing"));
    }

    #[test]
    fn test_stop_messages() {
        assert_eq!(stop_message(7, &StopOutcome::Stopped), "Stopped PID 7");
        assert_eq!(
            stop_message(7, &StopOutcome::NotManaged),
            "PID 7 is not a managed application"
        );
    }
}
