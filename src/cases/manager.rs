use crate::error::{AppError, Result};
use crate::models::{ArtifactType, Case, CaseStatus, ExecutionReport, Severity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{CaseFilter, CaseStatistics, CaseStore};

/// Fields supplied when opening a case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCase {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Case manager - case lifecycle operations over a [`CaseStore`]
#[derive(Clone)]
pub struct CaseManager {
    store: Arc<dyn CaseStore>,
}

impl CaseManager {
    pub fn new(store: Arc<dyn CaseStore>) -> Self {
        Self { store }
    }

    /// Create and persist a new case
    pub async fn create_case(&self, new_case: NewCase) -> Result<Case> {
        let case = Case::new(
            new_case.title,
            new_case.description,
            new_case.severity,
            new_case.tags,
        );
        case.validate()?;

        self.store.save_case(&case).await?;
        info!(case_id = %case.id, severity = %case.severity, "Case created");
        Ok(case)
    }

    pub async fn get_case(&self, id: Uuid) -> Result<Case> {
        self.store
            .get_case(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case {} not found", id)))
    }

    pub async fn list_cases(&self, filter: &CaseFilter, limit: usize) -> Result<Vec<Case>> {
        self.store.list_cases(filter, limit).await
    }

    pub async fn update_status(&self, id: Uuid, status: CaseStatus, user: &str) -> Result<Case> {
        let case = self.modify(id, |case| case.update_status(status, user)).await?;
        info!(case_id = %id, status = %status, "Case status updated");
        Ok(case)
    }

    pub async fn add_comment(&self, id: Uuid, comment: String, user: &str) -> Result<Case> {
        if comment.trim().is_empty() {
            return Err(AppError::Validation("Comment must not be empty".to_string()));
        }
        self.modify(id, |case| case.add_comment(comment, user)).await
    }

    pub async fn add_artifact(
        &self,
        id: Uuid,
        artifact_type: ArtifactType,
        value: String,
        description: String,
        tags: Vec<String>,
    ) -> Result<Case> {
        if value.trim().is_empty() {
            return Err(AppError::Validation("Artifact value must not be empty".to_string()));
        }
        self.modify(id, |case| {
            case.add_artifact(artifact_type, value, description, tags);
        })
        .await
    }

    pub async fn assign(&self, id: Uuid, assignee: String, user: &str) -> Result<Case> {
        self.modify(id, |case| case.assign(assignee, user)).await
    }

    /// Record a playbook run on the case timeline
    pub async fn attach_report(
        &self,
        id: Uuid,
        playbook_name: &str,
        report: &ExecutionReport,
    ) -> Result<Case> {
        self.modify(id, |case| case.record_playbook_run(playbook_name, report))
            .await
    }

    pub async fn delete_case(&self, id: Uuid) -> Result<bool> {
        let deleted = self.store.delete_case(&id).await?;
        if deleted {
            info!(case_id = %id, "Case deleted");
        }
        Ok(deleted)
    }

    pub async fn search_cases(&self, query: &str) -> Result<Vec<Case>> {
        self.store.search_cases(query).await
    }

    pub async fn statistics(&self) -> Result<CaseStatistics> {
        self.store.statistics().await
    }

    async fn modify<F>(&self, id: Uuid, change: F) -> Result<Case>
    where
        F: FnOnce(&mut Case) + Send,
    {
        let mut case = self.get_case(id).await?;
        change(&mut case);
        self.store.update_case(&case).await
    }
}
