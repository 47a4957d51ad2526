/// Default file locations, following the XDG base directory layout:
///   - `$XDG_CONFIG_HOME/dogstatus/config.toml`   read by the daemon
///   - `$XDG_DATA_HOME/dogstatus/events.tsv`      the event log
///   - `$XDG_DATA_HOME/dogstatus/status.toml`     written for external displays
///   - `$TMPDIR/dogstatus`                        latest published state
///
/// Without the XDG variables the usual `~/.config` and `~/.local/share` are
/// used, and without `HOME` the current directory.
use std::path::PathBuf;

const APP_DIR_NAME: &str = "dogstatus";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const EVENT_LOG_FILE_NAME: &str = "events.tsv";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const PUBLISH_FILE_NAME: &str = "dogstatus";

fn base_dir(xdg_var: &str, home_suffix: &[&str]) -> PathBuf {
    if let Some(dir) = std::env::var_os(xdg_var).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        Some(home) => home_suffix.iter().fold(PathBuf::from(home), |p, s| p.join(s)),
        None => PathBuf::from("."),
    }
}

pub fn config_dir() -> PathBuf {
    base_dir("XDG_CONFIG_HOME", &[".config"]).join(APP_DIR_NAME)
}

pub fn data_dir() -> PathBuf {
    base_dir("XDG_DATA_HOME", &[".local", "share"]).join(APP_DIR_NAME)
}

pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

pub fn event_log_path() -> PathBuf {
    data_dir().join(EVENT_LOG_FILE_NAME)
}

pub fn status_file_path() -> PathBuf {
    data_dir().join(STATUS_FILE_NAME)
}

pub fn publish_file_path() -> PathBuf {
    std::env::temp_dir().join(PUBLISH_FILE_NAME)
}
