//! Pipeline log streaming.
//!
//! Every pipeline stage reports progress through a process-wide broadcast
//! channel. Entries are echoed to stderr (stdout carries CLI output) and
//! forwarded to HTTP clients subscribed to the SSE endpoint.

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast buffer; slow subscribers lose older entries.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(&self) -> &'static str {
        match self {
            Self::Info => "  ",
            Self::Success => "✓ ",
            Self::Warning => "⚠️ ",
            Self::Error => "❌",
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    /// Pipeline stage that emitted the entry ("validate", "charts", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub message: String,
    /// RFC 3339, millisecond precision.
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            stage: None,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn in_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    fn render(&self) -> String {
        match &self.stage {
            Some(stage) => format!("{} [{}] {}", self.level.marker(), stage, self.message),
            None => format!("{} {}", self.level.marker(), self.message),
        }
    }
}

pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fans log entries out to stderr and every SSE subscriber.
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn log(&self, entry: LogEntry) {
        eprintln!("{}", entry.render());
        // No subscribers is the normal CLI case.
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

/// Log under a named pipeline stage.
pub fn log_stage(level: LogLevel, stage: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(level, msg).in_stage(stage));
}
