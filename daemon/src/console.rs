/// Line-oriented event capture on stdin.
///
/// Each line is one command:
///   `<kind>`              the event happened now
///   `<kind> <timestamp>`  it happened at an ISO-8601 time
///   `<kind> -<N>m|-<N>h`  it happened N minutes/hours ago
///   `status`              print every tracker
///   `help`                list commands
///   `quit`                shut the daemon down
///
/// Timestamps are only split off here; they are resolved against the
/// current time zone setting when the event is handled.
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::event::DaemonEvent;
use crate::event_log::DefaultZone;

pub const HELP: &str = "\
commands:
  <kind>               record that <kind> happened now
  <kind> <timestamp>   record it at a time, e.g. 2026-10-19 07:45
  <kind> -<N>m | -<N>h record it N minutes or hours ago
  status               show every tracker
  quit                 stop the daemon";

/// When a recorded event happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum When {
    Now,
    /// Unparsed timestamp text.
    At(String),
    Ago(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Record { kind: String, when: When },
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unreadable time {0:?}; use e.g. 2026-10-19 07:45 or -20m")]
    BadTimestamp(String),
}

impl When {
    /// Absolute time for this moment, or `None` for "now".
    pub fn resolve(
        &self,
        zone: &DefaultZone,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CommandError> {
        match self {
            When::Now => Ok(None),
            When::Ago(d) => now
                .checked_sub_signed(*d)
                .map(Some)
                .ok_or_else(|| CommandError::BadTimestamp(format!("-{}s", d.num_seconds()))),
            When::At(text) => zone
                .parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| CommandError::BadTimestamp(text.clone())),
        }
    }
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    if word.is_empty() {
        return None;
    }
    let command = match word.to_ascii_lowercase().as_str() {
        "status" if rest.is_empty() => Command::Status,
        "help" | "?" if rest.is_empty() => Command::Help,
        "quit" | "exit" if rest.is_empty() => Command::Quit,
        _ => Command::Record { kind: word.to_string(), when: parse_when(rest) },
    };
    Some(command)
}

/// Reads the time part of a record command: empty, relative or absolute.
pub fn parse_when(text: &str) -> When {
    if text.is_empty() {
        return When::Now;
    }
    parse_ago(text).map_or_else(|| When::At(text.to_string()), When::Ago)
}

/// `-20m`, `-2h`, `-90s`. Amounts too large for a [`Duration`] yield `None`.
fn parse_ago(text: &str) -> Option<Duration> {
    let body = text.strip_prefix('-')?;
    let unit = body.chars().last()?;
    let amount: i64 = body[..body.len() - unit.len_utf8()].parse().ok()?;
    if amount < 0 {
        return None;
    }
    match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        _ => None,
    }
}

/// Reads commands from stdin until it closes. A closed stdin (running as a
/// service) only ends console input, not the daemon.
pub async fn run(tx: mpsc::Sender<DaemonEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::debug!("[console] stdin closed");
                break;
            }
            Err(e) => {
                log::warn!("[console] Failed to read stdin: {e}");
                break;
            }
        };
        let event = match parse_command(&line) {
            None => continue,
            Some(Command::Help) => {
                println!("{HELP}");
                continue;
            }
            Some(Command::Record { kind, when }) => DaemonEvent::EventRecorded { kind, when },
            Some(Command::Status) => DaemonEvent::StatusRequested,
            Some(Command::Quit) => DaemonEvent::Shutdown,
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}
