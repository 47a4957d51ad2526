/// Wiring from [`Config`] to concrete collaborators: the file event log, the
/// configured publisher and the display sinks.
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::Clock;
use crate::config::{Config, PublisherKind};
use crate::coordinator::StatusCoordinator;
use crate::display::{self, DisplaySink, LogDisplay, StatusFileDisplay};
use crate::event_log::FileEventLog;
use crate::publish::{FilePublisher, LogPublisher, NullPublisher, Publisher};

pub fn build_publisher(config: &Config) -> Box<dyn Publisher> {
    match config.publisher.kind {
        PublisherKind::Log => Box::new(LogPublisher),
        PublisherKind::File => Box::new(FilePublisher::new(config.publisher.effective_path())),
        PublisherKind::None => Box::new(NullPublisher),
    }
}

/// Builds the coordinator described by `config` and seeds it from the event log.
pub fn build_coordinator(config: &Config, clock: Arc<dyn Clock>) -> Result<StatusCoordinator> {
    let zone = config.global.zone()?;
    let log_path = config.global.event_log_path();
    let event_log = FileEventLog::new(&log_path, zone);

    let mut coordinator =
        StatusCoordinator::new(config, clock, Box::new(event_log), build_publisher(config))
            .context("Invalid tracker configuration")?;
    coordinator
        .load()
        .with_context(|| format!("Failed to read event log {}", log_path.display()))?;
    Ok(coordinator)
}

pub fn build_sinks(config: &Config) -> Vec<Box<dyn DisplaySink>> {
    vec![
        Box::new(LogDisplay),
        Box::new(StatusFileDisplay::new(config.global.status_file_path())),
    ]
}

/// Console report: one line per tracker, then the overall state.
pub fn status_report(coordinator: &StatusCoordinator) -> String {
    let snapshot = coordinator.snapshot();
    let mut lines = display::render_lines(&snapshot);
    let published = coordinator
        .last_published()
        .map_or_else(|| "nothing yet".to_string(), |s| s.to_string());
    lines.push(format!("overall {} (last published: {published})", snapshot.aggregate));
    lines.join("\n")
}
