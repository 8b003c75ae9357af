use crate::error::{AppError, Result};
use crate::models::Case;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{matches_query, sort_newest_first, CaseFilter, CaseStatistics, CaseStore};

/// In-memory case store (for tests and throwaway sessions)
#[derive(Clone, Default)]
pub struct InMemoryCaseStore {
    cases: Arc<DashMap<Uuid, Case>>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn save_case(&self, case: &Case) -> Result<()> {
        self.cases.insert(case.id, case.clone());
        tracing::debug!(case_id = %case.id, "Case saved");
        Ok(())
    }

    async fn get_case(&self, id: &Uuid) -> Result<Option<Case>> {
        Ok(self.cases.get(id).map(|entry| entry.clone()))
    }

    async fn update_case(&self, case: &Case) -> Result<Case> {
        match self.cases.get_mut(&case.id) {
            Some(mut entry) => {
                let mut updated = case.clone();
                updated.updated_at = Utc::now();
                *entry = updated.clone();
                tracing::debug!(case_id = %case.id, "Case updated");
                Ok(updated)
            }
            None => Err(AppError::NotFound(format!("Case {} not found", case.id))),
        }
    }

    async fn delete_case(&self, id: &Uuid) -> Result<bool> {
        let removed = self.cases.remove(id).is_some();
        if removed {
            tracing::debug!(case_id = %id, "Case deleted");
        }
        Ok(removed)
    }

    async fn list_cases(&self, filter: &CaseFilter, limit: usize) -> Result<Vec<Case>> {
        let mut cases: Vec<Case> = self
            .cases
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        sort_newest_first(&mut cases);
        cases.truncate(limit);
        Ok(cases)
    }

    async fn search_cases(&self, query: &str) -> Result<Vec<Case>> {
        let query = query.to_lowercase();
        let mut cases: Vec<Case> = self
            .cases
            .iter()
            .filter(|entry| matches_query(entry.value(), &query))
            .map(|entry| entry.value().clone())
            .collect();

        sort_newest_first(&mut cases);
        Ok(cases)
    }

    async fn statistics(&self) -> Result<CaseStatistics> {
        let cases: Vec<Case> = self.cases.iter().map(|entry| entry.value().clone()).collect();
        Ok(CaseStatistics::from_cases(&cases))
    }
}
