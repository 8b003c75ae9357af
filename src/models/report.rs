use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Error,
}

/// One entry of a run's append-only execution log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Immutable record of one playbook run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub id: Uuid,

    /// Name of the playbook that ran
    pub playbook: String,

    pub status: ExecutionStatus,

    /// Message of the error that stopped the run
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    /// Wall-clock duration
    pub duration_seconds: f64,

    pub execution_log: Vec<LogEntry>,

    /// Final variable snapshot
    pub context: Map<String, JsonValue>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Look up a top-level variable in the final context
    pub fn variable(&self, name: &str) -> Option<&JsonValue> {
        self.context.get(name)
    }

    /// Log messages in order, without timestamps
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.execution_log.iter().map(|entry| entry.message.as_str())
    }

    /// Whether any log entry has exactly this message
    pub fn has_message(&self, message: &str) -> bool {
        self.messages().any(|m| m == message)
    }
}
