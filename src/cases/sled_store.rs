use crate::error::{AppError, Result};
use crate::models::Case;
use async_trait::async_trait;
use chrono::Utc;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::{matches_query, sort_newest_first, CaseFilter, CaseStatistics, CaseStore};

/// Persistent case store using the Sled embedded database.
///
/// Cases are kept as JSON documents in the `cases` tree, keyed by id bytes.
#[derive(Clone)]
pub struct SledCaseStore {
    db: Arc<Db>,
    cases_tree: sled::Tree,
}

impl SledCaseStore {
    /// Open (or create) a store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .map_err(|e| AppError::Database(format!("Failed to open Sled database: {}", e)))?;

        let cases_tree = db
            .open_tree("cases")
            .map_err(|e| AppError::Database(format!("Failed to open cases tree: {}", e)))?;

        tracing::info!(path = %path.display(), "Initialized Sled case store");

        Ok(Self {
            db: Arc::new(db),
            cases_tree,
        })
    }

    fn serialize_case(case: &Case) -> Result<Vec<u8>> {
        serde_json::to_vec(case)
            .map_err(|e| AppError::Serialization(format!("Failed to serialize case: {}", e)))
    }

    fn deserialize_case(bytes: &[u8]) -> Result<Case> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize case: {}", e)))
    }

    fn flush_tree(&self) -> Result<()> {
        self.cases_tree
            .flush()
            .map_err(|e| AppError::Database(format!("Failed to flush cases tree: {}", e)))?;
        Ok(())
    }

    fn case_key(id: &Uuid) -> [u8; 16] {
        *id.as_bytes()
    }

    fn all_cases(&self) -> Result<Vec<Case>> {
        self.cases_tree
            .iter()
            .values()
            .map(|value| Self::deserialize_case(&value?))
            .collect()
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl CaseStore for SledCaseStore {
    async fn save_case(&self, case: &Case) -> Result<()> {
        let bytes = Self::serialize_case(case)?;
        self.cases_tree.insert(Self::case_key(&case.id), bytes)?;
        self.flush_tree()?;
        tracing::debug!(case_id = %case.id, "Case saved");
        Ok(())
    }

    async fn get_case(&self, id: &Uuid) -> Result<Option<Case>> {
        match self.cases_tree.get(Self::case_key(id))? {
            Some(bytes) => Ok(Some(Self::deserialize_case(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update_case(&self, case: &Case) -> Result<Case> {
        let key = Self::case_key(&case.id);
        if !self.cases_tree.contains_key(key)? {
            return Err(AppError::NotFound(format!("Case {} not found", case.id)));
        }

        let mut updated = case.clone();
        updated.updated_at = Utc::now();
        self.cases_tree.insert(key, Self::serialize_case(&updated)?)?;
        self.flush_tree()?;
        tracing::debug!(case_id = %case.id, "Case updated");
        Ok(updated)
    }

    async fn delete_case(&self, id: &Uuid) -> Result<bool> {
        let removed = self.cases_tree.remove(Self::case_key(id))?.is_some();
        if removed {
            self.flush_tree()?;
            tracing::debug!(case_id = %id, "Case deleted");
        }
        Ok(removed)
    }

    async fn list_cases(&self, filter: &CaseFilter, limit: usize) -> Result<Vec<Case>> {
        let mut cases: Vec<Case> = self
            .all_cases()?
            .into_iter()
            .filter(|case| filter.matches(case))
            .collect();

        sort_newest_first(&mut cases);
        cases.truncate(limit);
        Ok(cases)
    }

    async fn search_cases(&self, query: &str) -> Result<Vec<Case>> {
        let query = query.to_lowercase();
        let mut cases: Vec<Case> = self
            .all_cases()?
            .into_iter()
            .filter(|case| matches_query(case, &query))
            .collect();

        sort_newest_first(&mut cases);
        Ok(cases)
    }

    async fn statistics(&self) -> Result<CaseStatistics> {
        Ok(CaseStatistics::from_cases(&self.all_cases()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactType, CaseStatus, Severity};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_with_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledCaseStore::new(temp_dir.path()).unwrap();

        let mut case = Case::new(
            "Beaconing host".to_string(),
            "Periodic outbound traffic".to_string(),
            Severity::High,
            vec!["network".to_string()],
        );
        case.add_artifact(ArtifactType::Domain, "c2.example".to_string(), String::new(), vec![]);
        store.save_case(&case).await.unwrap();

        let stored = store.get_case(&case.id).await.unwrap().unwrap();
        assert_eq!(stored.artifacts.len(), 1);
        assert_eq!(stored.artifacts[0].artifact_type, ArtifactType::Domain);
        assert_eq!(stored.events.len(), case.events.len());
    }

    #[tokio::test]
    async fn test_writes_are_flushed() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledCaseStore::new(temp_dir.path()).unwrap();
        let mut case = Case::new("Flushed".to_string(), String::new(), Severity::Low, vec![]);

        store.save_case(&case).await.unwrap();
        assert_eq!(store.cases_tree.flush().unwrap(), 0);

        case.update_status(CaseStatus::Investigating, "analyst");
        store.update_case(&case).await.unwrap();
        assert_eq!(store.cases_tree.flush().unwrap(), 0);

        assert!(store.delete_case(&case.id).await.unwrap());
        assert_eq!(store.cases_tree.flush().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let case = Case::new("Persisted".to_string(), String::new(), Severity::Low, vec![]);

        {
            let store = SledCaseStore::new(temp_dir.path()).unwrap();
            store.save_case(&case).await.unwrap();
            store.flush().await.unwrap();
        }

        let store = SledCaseStore::new(temp_dir.path()).unwrap();
        assert!(store.get_case(&case.id).await.unwrap().is_some());
    }
}
