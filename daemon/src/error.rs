use thiserror::Error;

/// Errors raised by the tracker, event log and coordinator.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Thresholds or tracker definitions that would make severities reorder or collide.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An event was recorded for a kind no tracker is configured for.
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    /// The kind cannot be stored in the tab-separated event log.
    #[error("Invalid event kind {0:?}")]
    InvalidKind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
