/// Presentation sinks fed from coordinator snapshots.
///
/// The daemon itself draws nothing. A sink receives each tracker's display
/// string and severity and decides how to render them: a log line, or a TOML
/// status file that a GUI or small panel display polls (read-only).
use std::path::{Path, PathBuf};

use crate::coordinator::StatusSnapshot;
use crate::severity::Highlight;

pub trait DisplaySink: Send {
    fn render(&mut self, snapshot: &StatusSnapshot);
}

/// Logs one line per tracker, e.g. `Pooping 18:04 [WARNING]`.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn render(&mut self, snapshot: &StatusSnapshot) {
        for line in render_lines(snapshot) {
            log::info!("[display] {line}");
        }
    }
}

/// Text lines for a snapshot. Flashing trackers are marked with `!`.
pub fn render_lines(snapshot: &StatusSnapshot) -> Vec<String> {
    snapshot
        .trackers
        .iter()
        .map(|t| {
            let marker = match t.highlight {
                Highlight::Flashing => "!",
                Highlight::Steady | Highlight::Plain => "",
            };
            format!("{} {} [{}]{marker}", t.label, t.display, t.severity)
        })
        .collect()
}

/// Writes every snapshot to a TOML file.
#[derive(Debug)]
pub struct StatusFileDisplay {
    path: PathBuf,
}

impl StatusFileDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DisplaySink for StatusFileDisplay {
    fn render(&mut self, snapshot: &StatusSnapshot) {
        write_status(&self.path, snapshot);
    }
}

/// Serializes `snapshot` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged rather than returned; a display that cannot be
/// written must not stop the polling loop.
pub fn write_status(path: &Path, snapshot: &StatusSnapshot) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("[status] Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(snapshot) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                log::error!("[status] Failed to write status file: {e}");
            }
        }
        Err(e) => log::error!("[status] Failed to serialize status: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::TrackerSnapshot;
    use crate::severity::Severity;

    fn tracker(label: &str, display: &str, severity: Severity) -> TrackerSnapshot {
        TrackerSnapshot {
            kind: label.to_lowercase(),
            label: label.to_string(),
            display: display.to_string(),
            severity,
            highlight: severity.highlight(),
            last_occurred: "2026-10-19T06:00:00+00:00".to_string(),
            elapsed_secs: 0,
        }
    }

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            subject: "sheffield".to_string(),
            aggregate: Severity::Overdue,
            trackers: vec![
                tracker("Outside", "8:12", Severity::Overdue),
                tracker("Pooping", "3:05", Severity::Normal),
            ],
        }
    }

    // ── render_lines ──────────────────────────────────────────────────────────

    #[test]
    fn render_lines_one_per_tracker() {
        let lines = render_lines(&snapshot());
        assert_eq!(lines, vec!["Outside 8:12 [OVERDUE]!", "Pooping 3:05 [NORMAL]"]);
    }

    #[test]
    fn render_lines_warning_is_not_flashing() {
        let mut snap = snapshot();
        snap.trackers = vec![tracker("Outside", "6:30", Severity::Warning)];
        assert_eq!(render_lines(&snap), vec!["Outside 6:30 [WARNING]"]);
    }

    #[test]
    fn log_display_renders_without_panicking() {
        LogDisplay.render(&snapshot());
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("status.toml");
        write_status(&path, &snapshot());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_is_readable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        StatusFileDisplay::new(&path).render(&snapshot());

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: toml::Value = toml::from_str(&content).unwrap();
        assert_eq!(parsed["aggregate"].as_str(), Some("OVERDUE"));
        assert_eq!(parsed["subject"].as_str(), Some("sheffield"));
        let trackers = parsed["trackers"].as_array().unwrap();
        assert_eq!(trackers.len(), 2);
        assert_eq!(trackers[0]["display"].as_str(), Some("8:12"));
        assert_eq!(trackers[0]["highlight"].as_str(), Some("flashing"));
        assert_eq!(trackers[1]["severity"].as_str(), Some("NORMAL"));
    }

    #[test]
    fn write_status_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let mut sink = StatusFileDisplay::new(&path);
        sink.render(&snapshot());

        let mut calmer = snapshot();
        calmer.aggregate = Severity::Normal;
        calmer.trackers = vec![tracker("Outside", "0:00", Severity::Normal)];
        sink.render(&calmer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("aggregate = \"NORMAL\""));
        assert!(!content.contains("OVERDUE"));
    }
}
