//! Door event publishing.
//!
//! A finalized, classified segment becomes a [`DoorEvent`] which is handed to
//! an [`EventPublisher`] sink. The sampling loop never talks to a sink
//! directly; it submits to an [`AsyncPublisher`] which owns the sink on a
//! worker thread.

pub mod http;
pub mod worker;

use crate::config::{PublishConfig, SinkConfig};
use crate::core::Label;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use worker::{AsyncPublisher, PublisherOptions};

/// Payload published for every classified door transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorEvent {
    #[serde(rename = "Door State")]
    pub door_state: String,
    /// ISO-8601 in the configured timezone
    pub timestamp: String,
}

impl DoorEvent {
    /// Build an event for `label` observed at `at`.
    ///
    /// Returns `None` for [`Label::Ignore`], which is never published.
    pub fn new(label: Label, at: DateTime<Utc>, tz: Tz) -> Option<Self> {
        if !label.is_trainable() {
            return None;
        }
        Some(Self {
            door_state: label.display_name().to_string(),
            timestamp: at
                .with_timezone(&tz)
                .to_rfc3339_opts(SecondsFormat::Millis, false),
        })
    }
}

/// Publishing errors.
#[derive(Debug)]
pub enum PublishError {
    Config(String),
    Io(String),
    Serialization(String),
    Network(String),
    Server { status: u16, message: String },
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Config(msg) => write!(f, "Publisher config error: {msg}"),
            PublishError::Io(msg) => write!(f, "Publisher IO error: {msg}"),
            PublishError::Serialization(msg) => write!(f, "Publisher serialization error: {msg}"),
            PublishError::Network(msg) => write!(f, "Publisher network error: {msg}"),
            PublishError::Server { status, message } => {
                write!(f, "Publisher server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for PublishError {}

/// A downstream consumer of door events.
pub trait EventPublisher: Send {
    fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError>;
}

impl<P: EventPublisher + Sync + ?Sized> EventPublisher for std::sync::Arc<P> {
    fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError> {
        (**self).publish(topic, event)
    }
}

impl<P: EventPublisher + ?Sized> EventPublisher for Box<P> {
    fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError> {
        (**self).publish(topic, event)
    }
}

/// Writes each event to the log.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError> {
        tracing::info!(
            topic,
            door_state = %event.door_state,
            timestamp = %event.timestamp,
            "Door event"
        );
        Ok(())
    }
}

/// Appends one JSON object per event to a file.
#[derive(Debug, Clone)]
pub struct JsonlPublisher {
    path: PathBuf,
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    topic: &'a str,
    #[serde(flatten)]
    event: &'a DoorEvent,
}

impl JsonlPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventPublisher for JsonlPublisher {
    fn publish(&self, topic: &str, event: &DoorEvent) -> Result<(), PublishError> {
        let mut line = serde_json::to_string(&JsonlRecord { topic, event })
            .map_err(|e| PublishError::Serialization(e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PublishError::Io(e.to_string()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PublishError::Io(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .map_err(|e| PublishError::Io(e.to_string()))
    }
}

/// Build the sink named in the configuration.
pub fn build_publisher(config: &PublishConfig) -> Result<Box<dyn EventPublisher>, PublishError> {
    match &config.sink {
        SinkConfig::Log => Ok(Box::new(LogPublisher)),
        SinkConfig::Jsonl { path } => Ok(Box::new(JsonlPublisher::new(path.clone()))),
        #[cfg(feature = "gateway")]
        SinkConfig::Http { url, token } => Ok(Box::new(http::BlockingHttpPublisher::new(
            http::HttpSinkConfig::new(url.clone(), token.clone(), config.client_id.clone()),
        )?)),
        #[cfg(not(feature = "gateway"))]
        SinkConfig::Http { .. } => Err(PublishError::Config(
            "HTTP sink requires building with the `gateway` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_event_wire_format() {
        let event = DoorEvent::new(Label::Open, at(), chrono_tz::UTC).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["Door State"], "Open");
        assert_eq!(json["timestamp"], "2024-03-01T12:30:00.000+00:00");
    }

    #[test]
    fn test_event_uses_timezone() {
        let event = DoorEvent::new(Label::Closed, at(), chrono_tz::Asia::Kolkata).unwrap();
        assert_eq!(event.door_state, "Closed");
        assert_eq!(event.timestamp, "2024-03-01T18:00:00.000+05:30");
    }

    #[test]
    fn test_ignore_is_not_published() {
        assert!(DoorEvent::new(Label::Ignore, at(), chrono_tz::UTC).is_none());
    }

    #[test]
    fn test_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("events.jsonl");
        let sink = JsonlPublisher::new(&path);

        let open = DoorEvent::new(Label::Open, at(), chrono_tz::UTC).unwrap();
        let closed = DoorEvent::new(Label::Closed, at(), chrono_tz::UTC).unwrap();
        sink.publish("door/state", &open).unwrap();
        sink.publish("door/state", &closed).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["topic"], "door/state");
        assert_eq!(lines[0]["Door State"], "Open");
        assert_eq!(lines[1]["Door State"], "Closed");
    }

    #[test]
    fn test_build_publisher() {
        let mut config = PublishConfig::default();
        assert!(build_publisher(&config).is_ok());
        config.sink = SinkConfig::Http {
            url: "http://127.0.0.1:9".to_string(),
            token: "t".to_string(),
        };
        assert_eq!(build_publisher(&config).is_ok(), cfg!(feature = "gateway"));
    }
}
