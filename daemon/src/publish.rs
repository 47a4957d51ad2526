/// Outbound notification of the aggregate severity.
///
/// The coordinator hands every change to a [`Publisher`] as a `(topic, payload)`
/// pair. Transports are expected to return promptly; a failed publish is
/// retried by the coordinator on its next tick.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub trait Publisher: Send {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError>;

    /// Re-establishes the transport before a publish. A no-op for transports
    /// without a connection.
    fn reconnect(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Discards every message.
#[derive(Debug, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&mut self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Writes messages to the application log.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        log::info!("[publish] {topic} = {payload}");
        Ok(())
    }
}

/// Last message written by [`FilePublisher`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub state: String,
    /// RFC 3339 local time of the write.
    pub published_at: String,
}

/// Keeps the most recent message in a small TOML file that other local
/// processes can watch.
#[derive(Debug)]
pub struct FilePublisher {
    path: PathBuf,
}

impl FilePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Publisher for FilePublisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let message = PublishedMessage {
            topic: topic.to_string(),
            state: payload.to_string(),
            published_at: chrono::Local::now().to_rfc3339(),
        };
        let content = toml::to_string_pretty(&message)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Creates the parent directory if it has gone missing.
    fn reconnect(&mut self) -> Result<(), PublishError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingPublisher;
