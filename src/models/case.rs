use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::report::ExecutionReport;

/// A security case tracked alongside playbook runs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Case {
    /// Unique identifier
    pub id: Uuid,

    /// Human-readable title
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    /// Detailed description
    pub description: String,

    pub severity: Severity,

    pub status: CaseStatus,

    pub assigned_to: Option<String>,

    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub closed_at: Option<DateTime<Utc>>,

    /// Indicators attached to the case, append-only
    pub artifacts: Vec<Artifact>,

    /// Timeline of events, append-only
    pub events: Vec<CaseEvent>,

    /// Names of playbooks run against this case
    pub playbooks_executed: Vec<String>,
}

impl Case {
    /// Create a new case
    pub fn new(title: String, description: String, severity: Severity, tags: Vec<String>) -> Self {
        let now = Utc::now();
        let mut case = Self {
            id: Uuid::new_v4(),
            title,
            description,
            severity,
            status: CaseStatus::Open,
            assigned_to: None,
            tags,
            created_at: now,
            updated_at: now,
            closed_at: None,
            artifacts: Vec::new(),
            events: Vec::new(),
            playbooks_executed: Vec::new(),
        };

        let description = format!("Case created: {}", case.title);
        case.add_event(CaseEventType::Created, description, "system", HashMap::new());
        case
    }

    /// Add an event to the timeline
    pub fn add_event(
        &mut self,
        event_type: CaseEventType,
        description: String,
        user: &str,
        metadata: HashMap<String, JsonValue>,
    ) {
        self.events.push(CaseEvent {
            id: Uuid::new_v4(),
            event_type,
            description,
            user: user.to_string(),
            timestamp: Utc::now(),
            metadata,
        });
        self.updated_at = Utc::now();
    }

    /// Attach an artifact and record it on the timeline
    pub fn add_artifact(
        &mut self,
        artifact_type: ArtifactType,
        value: String,
        description: String,
        tags: Vec<String>,
    ) -> &Artifact {
        let event = format!("Added {}: {}", artifact_type, value);
        self.artifacts.push(Artifact {
            id: Uuid::new_v4(),
            artifact_type,
            value,
            description,
            tags,
            added_at: Utc::now(),
        });
        self.add_event(CaseEventType::ArtifactAdded, event, "system", HashMap::new());

        &self.artifacts[self.artifacts.len() - 1]
    }

    /// Update case status
    pub fn update_status(&mut self, new_status: CaseStatus, user: &str) {
        let old_status = self.status;
        self.status = new_status;

        if new_status == CaseStatus::Closed {
            self.closed_at = Some(Utc::now());
        }

        self.add_event(
            CaseEventType::StatusChange,
            format!("Status changed from {} to {}", old_status, new_status),
            user,
            HashMap::from([
                ("old_status".to_string(), JsonValue::String(old_status.to_string())),
                ("new_status".to_string(), JsonValue::String(new_status.to_string())),
            ]),
        );
    }

    pub fn add_comment(&mut self, comment: String, user: &str) {
        self.add_event(CaseEventType::Comment, comment, user, HashMap::new());
    }

    pub fn assign(&mut self, assignee: String, user: &str) {
        let description = format!("Assigned to {}", assignee);
        self.assigned_to = Some(assignee);
        self.add_event(CaseEventType::Assigned, description, user, HashMap::new());
    }

    /// Record a playbook run, keeping the full report in the event metadata
    pub fn record_playbook_run(&mut self, playbook_name: &str, report: &ExecutionReport) {
        self.playbooks_executed.push(playbook_name.to_string());

        let mut metadata = HashMap::new();
        metadata.insert("playbook".to_string(), JsonValue::String(playbook_name.to_string()));
        metadata.insert(
            "result".to_string(),
            serde_json::to_value(report).unwrap_or(JsonValue::Null),
        );

        self.add_event(
            CaseEventType::PlaybookRun,
            format!("Executed playbook: {} - Status: {}", playbook_name, report.status),
            "system",
            metadata,
        );
    }

    /// Open or under investigation
    pub fn is_active(&self) -> bool {
        matches!(self.status, CaseStatus::Open | CaseStatus::Investigating)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CaseStatus {
    #[default]
    Open,
    Investigating,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ArtifactType {
    Ip,
    Domain,
    Hash,
    Email,
    Url,
}

/// Security artifact (IOC) associated with a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub artifact_type: ArtifactType,
    pub value: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseEventType {
    Created,
    Comment,
    StatusChange,
    PlaybookRun,
    ArtifactAdded,
    Assigned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseEvent {
    pub id: Uuid,
    pub event_type: CaseEventType,
    pub description: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionStatus, LogEntry};
    use serde_json::Map;

    fn create_test_case() -> Case {
        Case::new(
            "Suspicious login".to_string(),
            "Multiple failed logins".to_string(),
            Severity::High,
            vec!["auth".to_string()],
        )
    }

    #[test]
    fn test_case_creation() {
        let case = create_test_case();

        assert_eq!(case.status, CaseStatus::Open);
        assert_eq!(case.severity, Severity::High);
        assert_eq!(case.events.len(), 1);
        assert_eq!(case.events[0].event_type, CaseEventType::Created);
        assert_eq!(case.events[0].description, "Case created: Suspicious login");
        assert!(case.is_active());
        assert!(case.validate().is_ok());
    }

    #[test]
    fn test_empty_title_fails_validation() {
        let case = Case::new(String::new(), String::new(), Severity::Low, vec![]);
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_status_change_and_close() {
        let mut case = create_test_case();

        case.update_status(CaseStatus::Investigating, "analyst");
        assert!(case.closed_at.is_none());
        assert!(case.is_active());

        case.update_status(CaseStatus::Closed, "analyst");
        assert!(case.closed_at.is_some());
        assert!(!case.is_active());

        let last = case.events.last().unwrap();
        assert_eq!(last.event_type, CaseEventType::StatusChange);
        assert_eq!(last.description, "Status changed from investigating to closed");
        assert_eq!(last.user, "analyst");
    }

    #[test]
    fn test_artifact_recorded_on_timeline() {
        let mut case = create_test_case();
        let artifact_id = case
            .add_artifact(ArtifactType::Ip, "203.0.113.7".to_string(), String::new(), vec![])
            .id;

        assert_eq!(case.artifacts.len(), 1);
        assert_eq!(case.artifacts[0].id, artifact_id);
        assert_eq!(case.events.last().unwrap().description, "Added ip: 203.0.113.7");
    }

    #[test]
    fn test_playbook_run_recorded() {
        let mut case = create_test_case();
        let report = ExecutionReport {
            id: Uuid::new_v4(),
            playbook: "IP Investigation".to_string(),
            status: ExecutionStatus::Success,
            error: None,
            started_at: Utc::now(),
            duration_seconds: 0.1,
            execution_log: vec![LogEntry {
                timestamp: Utc::now(),
                level: crate::models::LogLevel::Info,
                message: "Starting playbook: IP Investigation".to_string(),
            }],
            context: Map::new(),
        };

        case.record_playbook_run("IP Investigation", &report);

        assert_eq!(case.playbooks_executed, vec!["IP Investigation".to_string()]);
        let event = case.events.last().unwrap();
        assert_eq!(event.event_type, CaseEventType::PlaybookRun);
        assert_eq!(
            event.description,
            "Executed playbook: IP Investigation - Status: SUCCESS"
        );
        assert_eq!(event.metadata["result"]["status"], "SUCCESS");
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("investigating".parse::<CaseStatus>().unwrap(), CaseStatus::Investigating);
        assert_eq!("url".parse::<ArtifactType>().unwrap(), ArtifactType::Url);
        assert!("urgent".parse::<Severity>().is_err());
    }
}
