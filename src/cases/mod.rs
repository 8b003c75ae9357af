//! Case tracking: storage backends and the manager wrapping them.

pub mod factory;
pub mod manager;
pub mod sled_store;
pub mod store;

pub use factory::{create_in_memory_store, create_store};
pub use manager::{CaseManager, NewCase};
pub use sled_store::SledCaseStore;
pub use store::InMemoryCaseStore;

use crate::error::Result;
use crate::models::{Case, CaseStatus, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default page size for listings
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Trait for case storage operations
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Save a case, replacing any case with the same id
    async fn save_case(&self, case: &Case) -> Result<()>;

    async fn get_case(&self, id: &Uuid) -> Result<Option<Case>>;

    /// Replace an existing case, refreshing `updated_at`; NotFound if absent
    async fn update_case(&self, case: &Case) -> Result<Case>;

    /// Delete a case, returning whether it existed
    async fn delete_case(&self, id: &Uuid) -> Result<bool>;

    /// Cases matching `filter`, newest first, at most `limit`
    async fn list_cases(&self, filter: &CaseFilter, limit: usize) -> Result<Vec<Case>>;

    /// Case-insensitive substring search over title and description, newest first
    async fn search_cases(&self, query: &str) -> Result<Vec<Case>>;

    async fn statistics(&self) -> Result<CaseStatistics>;
}

/// Filter for listing cases
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub severity: Option<Severity>,
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        self.status.map_or(true, |status| case.status == status)
            && self.severity.map_or(true, |severity| case.severity == severity)
    }
}

/// Aggregate counts over all stored cases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStatistics {
    pub total: usize,

    /// Open or under investigation
    pub open: usize,

    pub by_status: BTreeMap<String, usize>,

    pub by_severity: BTreeMap<String, usize>,
}

impl CaseStatistics {
    pub fn from_cases<'a>(cases: impl IntoIterator<Item = &'a Case>) -> Self {
        let mut stats = Self::default();
        for case in cases {
            stats.total += 1;
            if case.is_active() {
                stats.open += 1;
            }
            *stats.by_status.entry(case.status.to_string()).or_default() += 1;
            *stats.by_severity.entry(case.severity.to_string()).or_default() += 1;
        }
        stats
    }
}

/// Whether `query` (already lowercased) occurs in the title or description
pub(crate) fn matches_query(case: &Case, query: &str) -> bool {
    case.title.to_lowercase().contains(query) || case.description.to_lowercase().contains(query)
}

/// Sort by creation time (newest first)
pub(crate) fn sort_newest_first(cases: &mut [Case]) {
    cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
