use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::DaemonEvent;
use crate::event_log::DefaultZone;
use crate::paths;

pub const DEFAULT_SUBJECT: &str = "sheffield";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const MIN_TICK_INTERVAL_MS: u64 = 100;
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_TIMEZONE: &str = "local";

const HOUR: u64 = 3600;

/// Root configuration structure. Deserialized from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// Event kinds to track, in display order.
    #[serde(default = "default_trackers")]
    pub trackers: Vec<TrackerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            publisher: PublisherConfig::default(),
            trackers: default_trackers(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalConfig {
    /// Name of the animal (or person) being tracked; used in the publish topic.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Polling cadence in milliseconds. Clamped to [100, 60000].
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Tab-separated event log. Defaults to the data directory.
    pub event_log: Option<PathBuf>,
    /// TOML snapshot for external displays. Defaults to the data directory.
    pub status_file: Option<PathBuf>,
    /// Zone for log timestamps without an offset: `local`, `UTC` or `+HH:MM`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            event_log: None,
            status_file: None,
            timezone: default_timezone(),
        }
    }
}

impl GlobalConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms.clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS),
        )
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.event_log.clone().unwrap_or_else(paths::event_log_path)
    }

    pub fn status_file_path(&self) -> PathBuf {
        self.status_file.clone().unwrap_or_else(paths::status_file_path)
    }

    pub fn zone(&self) -> Result<DefaultZone> {
        self.timezone
            .parse()
            .with_context(|| format!("Invalid timezone setting {:?}", self.timezone))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    #[default]
    Log,
    File,
    None,
}

/// Where aggregate severity changes are sent.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PublisherConfig {
    #[serde(default)]
    pub kind: PublisherKind,
    /// Output file for the `file` publisher.
    pub path: Option<PathBuf>,
    /// Overrides the default `dogstatus/<subject>/outside` topic.
    pub topic: Option<String>,
}

impl PublisherConfig {
    pub fn effective_topic(&self, subject: &str) -> String {
        self.topic
            .clone()
            .unwrap_or_else(|| format!("dogstatus/{subject}/outside"))
    }

    pub fn effective_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::publish_file_path)
    }
}

/// One tracked event kind.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Name written to the event log (e.g. "peed").
    pub kind: String,
    /// Human-readable name for displays. Falls back to `kind`.
    pub label: Option<String>,
    pub warning_secs: u64,
    pub overdue_secs: u64,
    /// Other log values that count as this kind (e.g. "True" in older logs).
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TrackerConfig {
    pub fn effective_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.kind)
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Whether a file-system event in the config directory should trigger a reload.
///
/// Only the directory holding the config is watched, so matching on the file
/// name is enough; notify reports absolute paths even when `config_path` is
/// relative. Editors that save via a temporary file and a rename show up as a
/// `Create` or `Modify` of the final name.
pub fn is_config_change(event: &notify::Event, config_path: &Path) -> bool {
    let Some(name) = config_path.file_name() else {
        return false;
    };
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == Some(name))
}

/// Starts a non-recursive watcher on `dir`. Events are forwarded from notify's
/// own thread into the returned channel; the watcher must be kept alive for as
/// long as the channel is read.
fn watch_dir(dir: &Path) -> notify::Result<(RecommendedWatcher, mpsc::Receiver<notify::Event>)> {
    let (event_tx, event_rx) = mpsc::channel(16);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = event_tx.blocking_send(event);
            }
            Err(e) => log::debug!("[config] Watcher error: {e}"),
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok((watcher, event_rx))
}

/// Reloads `path` whenever it changes on disk and forwards each config that
/// parses as `DaemonEvent::ConfigReloaded`. A config that fails to parse is
/// logged and the daemon keeps its current settings.
///
/// Returns once the daemon stops listening, or immediately if the directory
/// cannot be watched (hot reload is then simply off).
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let dir = match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => PathBuf::from("."),
        Some(dir) => dir.to_path_buf(),
        None => {
            log::warn!("[config] {} has no parent directory; hot reload off", path.display());
            return;
        }
    };
    if !dir.is_dir() {
        log::info!("[config] {} does not exist; hot reload off", dir.display());
        return;
    }

    let (_watcher, mut events) = match watch_dir(&dir) {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("[config] Cannot watch {}: {e}; hot reload off", dir.display());
            return;
        }
    };
    log::debug!("[config] Watching {}", dir.display());

    while let Some(event) = events.recv().await {
        if !is_config_change(&event, &path) {
            continue;
        }
        let config = match load_or_default(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("[config] Ignoring edited config: {e:#}");
                continue;
            }
        };
        if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
            return;
        }
    }
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// Outside trips and bowel movements, with the limits the household uses.
fn default_trackers() -> Vec<TrackerConfig> {
    vec![
        TrackerConfig {
            kind: "peed".to_string(),
            label: Some("Outside".to_string()),
            warning_secs: 6 * HOUR,
            overdue_secs: 8 * HOUR,
            aliases: vec!["False".to_string()],
        },
        TrackerConfig {
            kind: "pooped".to_string(),
            label: Some("Pooping".to_string()),
            warning_secs: 18 * HOUR,
            overdue_secs: 24 * HOUR,
            aliases: vec!["True".to_string()],
        },
    ]
}
